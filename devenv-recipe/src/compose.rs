//! Compose-style recipe documents.
//!
//! `decode` turns recipe text into a [`ComposeDocument`]; `encode` writes it
//! back out. Field coercions (command strings, `KEY=VALUE` lists, scalar
//! lists) happen while decoding so the document only holds normalized data.

use indexmap::IndexMap;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml_ng::Value;

use crate::error::{RecipeError, Result};

/// Content types accepted by [`decode`].
pub const SUPPORTED_CONTENT_TYPES: [&str; 3] = ["application/x-yaml", "text/yaml", "text/x-yaml"];

pub const DEFAULT_DOCKERFILE: &str = "Dockerfile";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComposeDocument {
    #[serde(
        default,
        deserialize_with = "optional_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub version: Option<String>,

    #[serde(default)]
    pub services: IndexMap<String, ComposeService>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComposeService {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(
        default,
        deserialize_with = "optional_build",
        skip_serializing_if = "Option::is_none"
    )]
    pub build: Option<ComposeBuild>,

    #[serde(default, deserialize_with = "words", skip_serializing_if = "Vec::is_empty")]
    pub entrypoint: Vec<String>,

    #[serde(default, deserialize_with = "words", skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,

    #[serde(
        default,
        deserialize_with = "environment",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub environment: IndexMap<String, String>,

    #[serde(default, deserialize_with = "scalar_list", skip_serializing_if = "Vec::is_empty")]
    pub expose: Vec<String>,

    #[serde(default, deserialize_with = "scalar_list", skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,

    #[serde(
        default,
        deserialize_with = "map_or_list",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub labels: IndexMap<String, String>,

    #[serde(default, deserialize_with = "service_names", skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(default, deserialize_with = "scalar_list", skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<String>,

    #[serde(default, deserialize_with = "scalar_list", skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,

    #[serde(default, deserialize_with = "scalar_list", skip_serializing_if = "Vec::is_empty")]
    pub volumes_from: Vec<String>,

    #[serde(default, deserialize_with = "scalar_list", skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mem_limit: Option<u64>,
}

/// Build section of a service, always in its long form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComposeBuild {
    pub context: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<String>,

    #[serde(
        default,
        deserialize_with = "map_or_list",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub args: IndexMap<String, String>,
}

/// Decode recipe text of the given content type.
pub fn decode(content: &str, content_type: &str) -> Result<ComposeDocument> {
    if !SUPPORTED_CONTENT_TYPES.contains(&content_type) {
        return Err(RecipeError::UnsupportedContentType {
            content_type: content_type.to_string(),
            supported: SUPPORTED_CONTENT_TYPES.iter().map(|t| t.to_string()).collect(),
        });
    }

    serde_yaml_ng::from_str(content).map_err(|e| RecipeError::MalformedRecipe(e.to_string()))
}

/// Serialize a document back to YAML. Formatting and key order may differ
/// from the text it was decoded from.
pub fn encode(document: &ComposeDocument) -> Result<String> {
    serde_yaml_ng::to_string(document).map_err(|e| RecipeError::MalformedRecipe(e.to_string()))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn optional_scalar<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(None),
        other => scalar_to_string(&other).map(Some).ok_or_else(|| {
            D::Error::custom(format!("expected a scalar, found {}", type_name(&other)))
        }),
    }
}

/// Command and entrypoint: a word list, or a string split on whitespace.
fn words<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    coerce_words(value).map_err(D::Error::custom)
}

fn coerce_words(value: Value) -> std::result::Result<Vec<String>, String> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(s) => Ok(s.split_whitespace().map(str::to_string).collect()),
        Value::Sequence(items) => items
            .iter()
            .map(|item| {
                scalar_to_string(item).ok_or_else(|| {
                    format!(
                        "command entries must be strings, found {}",
                        type_name(item)
                    )
                })
            })
            .collect(),
        other => Err(format!(
            "unsupported command type '{}', expected a string or a list of strings",
            type_name(&other)
        )),
    }
}

fn environment<'de, D>(deserializer: D) -> std::result::Result<IndexMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    coerce_environment(value).map_err(D::Error::custom)
}

fn coerce_environment(
    value: Value,
) -> std::result::Result<IndexMap<String, String>, String> {
    match value {
        Value::Null => Ok(IndexMap::new()),
        Value::String(s) if s.is_empty() => Ok(IndexMap::new()),
        Value::Mapping(mapping) => {
            let mut env = IndexMap::with_capacity(mapping.len());
            for (key, value) in &mapping {
                let key = scalar_to_string(key).ok_or_else(|| {
                    format!("environment keys must be strings, found {}", type_name(key))
                })?;
                let value = match value {
                    Value::Null => String::new(),
                    other => scalar_to_string(other).ok_or_else(|| {
                        format!(
                            "environment variable '{key}' has unsupported value type {}",
                            type_name(other)
                        )
                    })?,
                };
                env.insert(key, value);
            }
            Ok(env)
        }
        Value::Sequence(items) => {
            let mut env = IndexMap::with_capacity(items.len());
            for item in &items {
                let entry = scalar_to_string(item).ok_or_else(|| {
                    format!(
                        "environment entries must be strings, found {}",
                        type_name(item)
                    )
                })?;
                let (key, value) = entry.split_once('=').ok_or_else(|| {
                    format!("environment entry '{entry}' is not in KEY=VALUE format")
                })?;
                if key.is_empty() {
                    return Err(format!("environment entry '{entry}' has an empty name"));
                }
                env.insert(key.to_string(), value.to_string());
            }
            Ok(env)
        }
        other => Err(format!(
            "unsupported type '{}' of environment, expected a mapping or a list of KEY=VALUE strings",
            type_name(&other)
        )),
    }
}

/// Build args and labels: a mapping, or `KEY=VALUE` entries where a missing
/// `=` means an empty value.
fn map_or_list<'de, D>(deserializer: D) -> std::result::Result<IndexMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(IndexMap::new()),
        Value::Mapping(mapping) => mapping
            .iter()
            .map(|(key, value)| -> std::result::Result<(String, String), D::Error> {
                let key = scalar_to_string(key)
                    .ok_or_else(|| D::Error::custom("keys must be scalars"))?;
                let value = match value {
                    Value::Null => String::new(),
                    other => scalar_to_string(other).ok_or_else(|| {
                        D::Error::custom(format!(
                            "value of '{key}' must be a scalar, found {}",
                            type_name(other)
                        ))
                    })?,
                };
                Ok((key, value))
            })
            .collect(),
        Value::Sequence(items) => items
            .iter()
            .map(|item| -> std::result::Result<(String, String), D::Error> {
                let entry = scalar_to_string(item).ok_or_else(|| {
                    D::Error::custom(format!("entries must be strings, found {}", type_name(item)))
                })?;
                Ok(match entry.split_once('=') {
                    Some((key, value)) => (key.to_string(), value.to_string()),
                    None => (entry, String::new()),
                })
            })
            .collect(),
        other => Err(D::Error::custom(format!(
            "expected a mapping or a list, found {}",
            type_name(&other)
        ))),
    }
}

fn scalar_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(items) => items
            .iter()
            .map(|item| {
                scalar_to_string(item).ok_or_else(|| {
                    D::Error::custom(format!(
                        "list entries must be scalars, found {}",
                        type_name(item)
                    ))
                })
            })
            .collect(),
        other => Err(D::Error::custom(format!(
            "expected a list, found {}",
            type_name(&other)
        ))),
    }
}

/// `depends_on` in list form, or the long form keyed by service name.
fn service_names<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Mapping(mapping) => mapping
            .iter()
            .map(|(key, _)| {
                scalar_to_string(key).ok_or_else(|| {
                    D::Error::custom(format!("service names must be strings, found {}", type_name(key)))
                })
            })
            .collect(),
        other => scalar_list(other).map_err(D::Error::custom),
    }
}

#[derive(Deserialize)]
struct BuildLongForm {
    context: String,
    #[serde(default)]
    dockerfile: Option<String>,
    #[serde(default, deserialize_with = "map_or_list")]
    args: IndexMap<String, String>,
}

fn optional_build<'de, D>(deserializer: D) -> std::result::Result<Option<ComposeBuild>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(None),
        Value::String(context) => Ok(Some(ComposeBuild {
            context,
            dockerfile: None,
            args: IndexMap::new(),
        })),
        mapping @ Value::Mapping(_) => {
            let long: BuildLongForm =
                serde_yaml_ng::from_value(mapping).map_err(D::Error::custom)?;
            Ok(Some(ComposeBuild {
                context: long.context,
                dockerfile: long.dockerfile,
                args: long.args,
            }))
        }
        other => Err(D::Error::custom(format!(
            "build must be a context path or a mapping, found {}",
            type_name(&other)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = "application/x-yaml";

    fn service<'a>(document: &'a ComposeDocument, name: &str) -> &'a ComposeService {
        document.services.get(name).expect("service should exist")
    }

    #[test]
    fn test_all_yaml_content_types_are_accepted() {
        for content_type in SUPPORTED_CONTENT_TYPES {
            let document = decode("services:\n  db:\n    image: mysql\n", content_type).unwrap();
            assert_eq!(service(&document, "db").image.as_deref(), Some("mysql"));
        }
    }

    #[test]
    fn test_unsupported_content_type_names_supported_set() {
        let err = decode("services: {}", "application/json").unwrap_err();
        match &err {
            RecipeError::UnsupportedContentType { content_type, supported } => {
                assert_eq!(content_type, "application/json");
                assert_eq!(supported.len(), 3);
            }
            other => panic!("unexpected error {other:?}"),
        }
        let message = err.to_string();
        assert!(message.contains("text/yaml"));
        assert!(message.contains("text/x-yaml"));
    }

    #[test]
    fn test_malformed_yaml() {
        let err = decode("services: [unclosed", YAML).unwrap_err();
        assert!(matches!(err, RecipeError::MalformedRecipe(_)));
    }

    #[test]
    fn test_command_string_and_list_produce_same_words() {
        let from_string = decode(
            "services:\n  db:\n    image: mysql\n    command: \"service mysql start\"\n",
            YAML,
        )
        .unwrap();
        let from_list = decode(
            "services:\n  db:\n    image: mysql\n    command: [service, mysql, start]\n",
            YAML,
        )
        .unwrap();

        let expected = vec!["service", "mysql", "start"];
        assert_eq!(service(&from_string, "db").command, expected);
        assert_eq!(service(&from_list, "db").command, expected);
    }

    #[test]
    fn test_multiline_command_is_split_on_newlines() {
        let document = decode(
            "services:\n  dev:\n    image: ubuntu\n    command: |\n      tail -f\n      /dev/null\n",
            YAML,
        )
        .unwrap();
        assert_eq!(service(&document, "dev").command, vec!["tail", "-f", "/dev/null"]);
    }

    #[test]
    fn test_command_mapping_is_rejected() {
        let err = decode(
            "services:\n  dev:\n    image: ubuntu\n    command:\n      run: now\n",
            YAML,
        )
        .unwrap_err();
        match err {
            RecipeError::MalformedRecipe(message) => assert!(message.contains("mapping")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_environment_list_is_split_on_first_equals() {
        let document = decode(
            "services:\n  dev:\n    image: ubuntu\n    environment:\n      - KEY1=value1\n      - KEY2=value2\n      - OPTS=a=b\n",
            YAML,
        )
        .unwrap();
        let env = &service(&document, "dev").environment;
        assert_eq!(env.get("KEY1").map(String::as_str), Some("value1"));
        assert_eq!(env.get("KEY2").map(String::as_str), Some("value2"));
        assert_eq!(env.get("OPTS").map(String::as_str), Some("a=b"));
    }

    #[test]
    fn test_environment_mapping_stringifies_scalars() {
        let document = decode(
            "services:\n  dev:\n    image: ubuntu\n    environment:\n      PORT: 8080\n      DEBUG: true\n      EMPTY:\n",
            YAML,
        )
        .unwrap();
        let env = &service(&document, "dev").environment;
        assert_eq!(env.get("PORT").map(String::as_str), Some("8080"));
        assert_eq!(env.get("DEBUG").map(String::as_str), Some("true"));
        assert_eq!(env.get("EMPTY").map(String::as_str), Some(""));
    }

    #[test]
    fn test_environment_empty_string_is_empty_mapping() {
        let document =
            decode("services:\n  dev:\n    image: ubuntu\n    environment: \"\"\n", YAML).unwrap();
        assert!(service(&document, "dev").environment.is_empty());
    }

    #[test]
    fn test_environment_entry_without_value_is_rejected() {
        let err = decode(
            "services:\n  dev:\n    image: ubuntu\n    environment: [NOVALUE]\n",
            YAML,
        )
        .unwrap_err();
        match err {
            RecipeError::MalformedRecipe(message) => assert!(message.contains("NOVALUE")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_environment_entry_with_empty_name_is_rejected() {
        let err = decode(
            "services:\n  dev:\n    image: ubuntu\n    environment: [\"=value\"]\n",
            YAML,
        )
        .unwrap_err();
        assert!(matches!(err, RecipeError::MalformedRecipe(_)));
    }

    #[test]
    fn test_environment_of_unsupported_type_names_the_type() {
        let err = decode(
            "services:\n  dev:\n    image: ubuntu\n    environment: 42\n",
            YAML,
        )
        .unwrap_err();
        match err {
            RecipeError::MalformedRecipe(message) => assert!(message.contains("number")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_build_short_and_long_forms() {
        let document = decode(
            r#"
services:
  short:
    build: ./app
  long:
    build:
      context: ./api
      dockerfile: Dockerfile.dev
      args:
        - VERSION=1.2
        - FLAG
"#,
            YAML,
        )
        .unwrap();

        let short = service(&document, "short").build.as_ref().unwrap();
        assert_eq!(short.context, "./app");
        assert_eq!(short.dockerfile, None);

        let long = service(&document, "long").build.as_ref().unwrap();
        assert_eq!(long.context, "./api");
        assert_eq!(long.dockerfile.as_deref(), Some("Dockerfile.dev"));
        assert_eq!(long.args.get("VERSION").map(String::as_str), Some("1.2"));
        assert_eq!(long.args.get("FLAG").map(String::as_str), Some(""));
    }

    #[test]
    fn test_scalar_lists_accept_numbers() {
        let document = decode(
            "version: 3\nservices:\n  web:\n    image: nginx\n    expose: [80, \"443/tcp\"]\n    mem_limit: 2147483648\n",
            YAML,
        )
        .unwrap();
        assert_eq!(document.version.as_deref(), Some("3"));
        let web = service(&document, "web");
        assert_eq!(web.expose, vec!["80", "443/tcp"]);
        assert_eq!(web.mem_limit, Some(2_147_483_648));
    }

    #[test]
    fn test_decode_encode_round_trip() {
        let original = decode(
            r#"
version: "3"
services:
  db:
    image: mysql:5.7
    command: service mysql start
    environment:
      - MYSQL_ROOT_PASSWORD=secret
    expose: [3306]
    labels:
      tier: data
  dev:
    build:
      context: .
      args: {JDK: "8"}
    entrypoint: ["/bin/sh", "-c"]
    depends_on: [db]
    links: ["db:mysql"]
    volumes: ["/projects:/projects"]
    mem_limit: 1073741824
    container_name: dev-machine
"#,
            YAML,
        )
        .unwrap();

        let encoded = encode(&original).unwrap();
        let decoded = decode(&encoded, YAML).unwrap();
        assert_eq!(decoded, original);
    }
}
