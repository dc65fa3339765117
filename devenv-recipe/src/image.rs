//! Container image reference parsing.
//!
//! A reference is taken apart from the right: digest after the last `@`,
//! then a tag after a `:` that follows the last `/`, then an optional
//! registry in front of the first `/`.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{RecipeError, Result};

// One name component: alphanumerics joined by `.`, `_`, `__` or runs of `-`.
const NAME_COMPONENT: &str = r"[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*";

// Registry host components also accept interior underscores, which private
// registries running on internal hostnames commonly use.
const HOSTNAME_COMPONENT: &str = r"(?:[a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9_-]*[a-zA-Z0-9])";

static REPOSITORY_RE: OnceLock<Regex> = OnceLock::new();
static REGISTRY_RE: OnceLock<Regex> = OnceLock::new();

fn repository_regex() -> &'static Regex {
    REPOSITORY_RE.get_or_init(|| {
        Regex::new(&format!(r"^{NAME_COMPONENT}(?:/{NAME_COMPONENT})*$"))
            .expect("repository pattern is valid")
    })
}

fn registry_regex() -> &'static Regex {
    REGISTRY_RE.get_or_init(|| {
        Regex::new(&format!(
            r"^{HOSTNAME_COMPONENT}(?:\.{HOSTNAME_COMPONENT})*(?::[0-9]+)?$"
        ))
        .expect("registry pattern is valid")
    })
}

/// A parsed image reference such as `registry:5000/team/image:tag@sha256:...`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    pub repository: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl ImageReference {
    /// Parse an image reference string.
    ///
    /// Fails with [`RecipeError::InvalidReference`] when the string is empty
    /// or its repository/registry parts do not follow the reference grammar.
    pub fn parse(image: &str) -> Result<Self> {
        if image.is_empty() {
            return Err(RecipeError::invalid_reference(
                image,
                "null and empty argument value is forbidden",
            ));
        }

        let mut remaining = image;

        let mut digest = None;
        if let Some(at) = remaining.rfind('@') {
            let value = &remaining[at + 1..];
            if !value.is_empty() {
                digest = Some(value.to_string());
            }
            remaining = &remaining[..at];
        }

        let mut tag = None;
        if let Some(colon) = remaining.rfind(':') {
            let after_last_slash = remaining.rfind('/').map_or(true, |slash| colon > slash);
            if after_last_slash {
                let value = &remaining[colon + 1..];
                if !value.is_empty() {
                    tag = Some(value.to_string());
                }
                remaining = &remaining[..colon];
            }
        }

        let (registry, repository) = match remaining.split_once('/') {
            Some((head, rest)) if looks_like_registry(head) => (Some(head), rest),
            _ => (None, remaining),
        };

        if let Some(registry) = registry {
            if !registry_regex().is_match(registry) {
                return Err(RecipeError::invalid_reference(
                    image,
                    format!("registry '{registry}' is not a valid hostname"),
                ));
            }
        }

        if repository.is_empty() {
            return Err(RecipeError::invalid_reference(image, "repository is missing"));
        }
        if !repository_regex().is_match(repository) {
            return Err(RecipeError::invalid_reference(
                image,
                format!("repository '{repository}' does not match the name grammar"),
            ));
        }

        Ok(ImageReference {
            registry: registry.map(str::to_string),
            repository: repository.to_string(),
            tag,
            digest,
        })
    }

    /// Repository prefixed with the registry, without tag or digest.
    pub fn name(&self) -> String {
        match &self.registry {
            Some(registry) => format!("{registry}/{}", self.repository),
            None => self.repository.clone(),
        }
    }
}

fn looks_like_registry(head: &str) -> bool {
    !head.is_empty() && (head.contains('.') || head.contains(':') || head == "localhost")
}

impl FromStr for ImageReference {
    type Err = RecipeError;

    fn from_str(s: &str) -> Result<Self> {
        ImageReference::parse(s)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())?;
        if let Some(tag) = &self.tag {
            write!(f, ":{tag}")?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{digest}")?;
        }
        Ok(())
    }
}
