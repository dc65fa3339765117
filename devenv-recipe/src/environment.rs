//! Environment graph: the runtime view of a decoded recipe.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::compose::{self, ComposeDocument, ComposeService, DEFAULT_DOCKERFILE};
use crate::error::{RecipeError, Result};
use crate::fetch::RecipeFetcher;
use crate::image::ImageReference;

/// Build instructions of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildContext {
    pub context_path: String,
    pub dockerfile_path: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub build_args: IndexMap<String, String>,
}

/// One container of the environment.
///
/// When both `image` and `build` are present, `build` wins at creation time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,

    /// Raw image reference, parsed on demand by [`ServiceSpec::image_reference`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildContext>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entrypoint: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub environment: IndexMap<String, String>,

    /// Ports in `port/protocol` form.
    #[serde(default, skip_serializing_if = "IndexSet::is_empty")]
    pub exposed_ports: IndexSet<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub labels: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes_from: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit_bytes: Option<u64>,
}

impl ServiceSpec {
    fn from_compose(name: &str, service: ComposeService) -> Self {
        let build = service.build.map(|build| BuildContext {
            context_path: build.context,
            dockerfile_path: build
                .dockerfile
                .unwrap_or_else(|| DEFAULT_DOCKERFILE.to_string()),
            build_args: build.args,
        });

        ServiceSpec {
            name: name.to_string(),
            container_name: service.container_name,
            image: service.image,
            build,
            entrypoint: service.entrypoint,
            command: service.command,
            environment: service.environment,
            exposed_ports: service.expose.iter().map(|p| normalize_port(p)).collect(),
            ports: service.ports,
            labels: service.labels,
            depends_on: service.depends_on,
            links: service.links,
            volumes: service.volumes,
            volumes_from: service.volumes_from,
            networks: service.networks,
            memory_limit_bytes: service.mem_limit,
        }
    }

    /// Parse the image reference of this service, if it has one.
    pub fn image_reference(&self) -> Result<Option<ImageReference>> {
        self.image.as_deref().map(ImageReference::parse).transpose()
    }

    /// Names of the services this one must start after: `depends_on` plus the
    /// service part of every `name:alias` link.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.depends_on
            .iter()
            .map(String::as_str)
            .chain(self.links.iter().map(|link| link.split(':').next().unwrap_or(link)))
    }
}

/// Appends `/tcp` to a bare port number.
pub fn normalize_port(port: &str) -> String {
    if port.contains('/') {
        port.to_string()
    } else {
        format!("{port}/tcp")
    }
}

/// Services of a workspace environment keyed by name, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentGraph {
    pub services: IndexMap<String, ServiceSpec>,
}

impl EnvironmentGraph {
    pub fn from_document(document: ComposeDocument) -> Self {
        let services = document
            .services
            .into_iter()
            .map(|(name, service)| {
                let spec = ServiceSpec::from_compose(&name, service);
                (name, spec)
            })
            .collect();
        EnvironmentGraph { services }
    }

    pub fn service(&self, name: &str) -> Option<&ServiceSpec> {
        self.services.get(name)
    }

    pub fn service_mut(&mut self, name: &str) -> Option<&mut ServiceSpec> {
        self.services.get_mut(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml_ng::to_string(self).map_err(|e| RecipeError::MalformedRecipe(e.to_string()))
    }
}

/// Where a recipe comes from. Inline content wins over a location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

impl Recipe {
    pub fn inline(content_type: impl Into<String>, content: impl Into<String>) -> Self {
        Recipe {
            content_type: Some(content_type.into()),
            content: Some(content.into()),
            location: None,
        }
    }

    pub fn located(content_type: impl Into<String>, location: impl Into<String>) -> Self {
        Recipe {
            content_type: Some(content_type.into()),
            content: None,
            location: Some(location.into()),
        }
    }
}

/// Turns recipes into environment graphs, fetching remote content when needed.
pub struct EnvironmentGraphBuilder<F> {
    fetcher: F,
}

impl<F: RecipeFetcher> EnvironmentGraphBuilder<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    pub fn build(&self, recipe: &Recipe) -> Result<EnvironmentGraph> {
        let content_type = recipe
            .content_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                RecipeError::InvalidArgument("Recipe content type should not be null".into())
            })?;

        let content = non_empty(recipe.content.as_deref());
        let location = non_empty(recipe.location.as_deref());

        let document = match (content, location) {
            (Some(content), _) => compose::decode(content, content_type)?,
            (None, Some(location)) => {
                debug!(location, "fetching recipe");
                let fetched = self.fetcher.fetch(location).map_err(|source| {
                    RecipeError::RecipeUnavailable {
                        location: location.to_string(),
                        source,
                    }
                })?;
                compose::decode(&fetched, content_type)?
            }
            (None, None) => {
                return Err(RecipeError::InvalidArgument(
                    "Recipe must contain location or content".into(),
                ))
            }
        };

        let graph = EnvironmentGraph::from_document(document);
        info!(services = graph.len(), "built environment graph");
        Ok(graph)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
