//! Recipe fetch collaborators.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use tracing::debug;
use url::Url;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Retrieves recipe text by location.
pub trait RecipeFetcher {
    fn fetch(&self, location: &str) -> anyhow::Result<String>;
}

impl<T: RecipeFetcher + ?Sized> RecipeFetcher for &T {
    fn fetch(&self, location: &str) -> anyhow::Result<String> {
        (**self).fetch(location)
    }
}

/// Reads recipes from the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct FileRecipeFetcher {
    base_dir: Option<PathBuf>,
}

impl FileRecipeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relative locations are resolved against `base_dir`.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    fn resolve(&self, location: &str) -> PathBuf {
        let path = Path::new(location);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl RecipeFetcher for FileRecipeFetcher {
    fn fetch(&self, location: &str) -> anyhow::Result<String> {
        let path = self.resolve(location);
        debug!(path = %path.display(), "reading recipe file");
        std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read recipe file {}", path.display()))
    }
}

/// Downloads recipes over HTTP(S).
pub struct HttpRecipeFetcher {
    client: reqwest::blocking::Client,
}

impl HttpRecipeFetcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl RecipeFetcher for HttpRecipeFetcher {
    fn fetch(&self, location: &str) -> anyhow::Result<String> {
        debug!(location, "downloading recipe");
        let response = self
            .client
            .get(location)
            .send()
            .with_context(|| format!("Request to {location} failed"))?;

        let status = response.status();
        if !status.is_success() {
            bail!("Request to {location} returned status {status}");
        }

        response
            .text()
            .with_context(|| format!("Failed to read response body from {location}"))
    }
}

/// Picks the file or HTTP fetcher from the location's scheme.
pub struct UrlRecipeFetcher {
    file: FileRecipeFetcher,
    http: HttpRecipeFetcher,
}

impl UrlRecipeFetcher {
    pub fn new(file: FileRecipeFetcher, http: HttpRecipeFetcher) -> Self {
        Self { file, http }
    }

    pub fn with_timeout(timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self::new(FileRecipeFetcher::new(), HttpRecipeFetcher::new(timeout)?))
    }
}

impl RecipeFetcher for UrlRecipeFetcher {
    fn fetch(&self, location: &str) -> anyhow::Result<String> {
        match Url::parse(location) {
            Ok(url) => match url.scheme() {
                "http" | "https" => self.http.fetch(location),
                "file" => {
                    let path = url
                        .to_file_path()
                        .map_err(|_| anyhow::anyhow!("'{location}' is not a local file URL"))?;
                    self.file.fetch(&path.to_string_lossy())
                }
                // Single-letter schemes are Windows drive letters.
                scheme if scheme.len() == 1 => self.file.fetch(location),
                scheme => bail!("Unsupported recipe location scheme '{scheme}'"),
            },
            // Not an absolute URL, so a plain path.
            Err(_) => self.file.fetch(location),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_fetcher_resolves_relative_paths() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("recipe.yaml"), "services: {}\n").unwrap();

        let fetcher = FileRecipeFetcher::with_base_dir(dir.path());
        assert_eq!(fetcher.fetch("recipe.yaml").unwrap(), "services: {}\n");
        assert!(fetcher.fetch("missing.yaml").is_err());
    }

    #[test]
    fn test_url_fetcher_dispatches_on_scheme() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("recipe.yaml");
        std::fs::write(&path, "services: {}\n").unwrap();

        let fetcher = UrlRecipeFetcher::with_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(
            fetcher.fetch(&path.to_string_lossy()).unwrap(),
            "services: {}\n"
        );

        let file_url = Url::from_file_path(&path).unwrap();
        assert_eq!(fetcher.fetch(file_url.as_str()).unwrap(), "services: {}\n");

        let err = fetcher.fetch("ftp://recipes/db.yaml").unwrap_err();
        assert!(err.to_string().contains("ftp"));
    }
}
