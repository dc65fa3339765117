use std::path::{Component, Path, PathBuf};

use url::Url;

use crate::error::{Result, RootResolutionError};

/// Maps file URIs onto paths relative to the workspace root.
#[derive(Debug, Clone)]
pub(crate) struct WorkspacePaths {
    root: PathBuf,
}

impl WorkspacePaths {
    pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Segments of the workspace-relative path of `file_uri` with `..`
    /// resolved, or `None` when it points outside the workspace.
    ///
    /// Anything that is not a `file://` URI is taken as a workspace-relative
    /// path such as `/projA/src/Main.java`.
    pub(crate) fn segments(&self, file_uri: &str) -> Option<Vec<String>> {
        let relative = match file_uri.strip_prefix("file://") {
            Some(_) => {
                let path = Url::parse(file_uri).ok()?.to_file_path().ok()?;
                path.strip_prefix(&self.root).ok()?.to_path_buf()
            }
            None => PathBuf::from(file_uri),
        };

        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => segments.push(part.to_string_lossy().into_owned()),
                // Climbing above the workspace root leaves the workspace.
                Component::ParentDir => {
                    segments.pop()?;
                }
                _ => {}
            }
        }
        Some(segments)
    }

    pub(crate) fn root_uri(&self, relative: &Path) -> Result<String> {
        let path = if relative.as_os_str().is_empty() {
            self.root.clone()
        } else {
            self.root.join(relative)
        };
        Url::from_file_path(&path)
            .map(|url| url.to_string())
            .map_err(|_| RootResolutionError::InvalidWorkspaceRoot(self.root.display().to_string()))
    }
}
