//! Declarative workflow configuration schema
//!
//! A workflow configuration is a YAML document with a single `workflows` key
//! holding an ordered list of single-key mappings:
//!
//! ```yaml
//! workflows:
//!   - superagent:
//!       name: Support
//!       llm: gpt-4-1106-preview
//!       prompt: Answer support questions
//!       tools:
//!         - browser:
//!             name: web
//!             use_for: browsing
//!       data:
//!         use_for: product manuals
//!         urls:
//!           - https://example.com/manual.pdf
//! ```
//!
//! The key of each entry is a type tag, not an identity; identity is the
//! `name` field of the body.

use crate::types::AppError;
use serde::de::{self, IgnoredAny, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;

/// A single-key mapping `{tag: spec}`
#[derive(Debug, Clone, PartialEq)]
pub struct Tagged<T> {
    pub tag: String,
    pub spec: T,
}

impl<T> Tagged<T> {
    pub fn new(tag: impl Into<String>, spec: T) -> Self {
        Self {
            tag: tag.into(),
            spec,
        }
    }
}

impl<T: Serialize> Serialize for Tagged<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.tag, &self.spec)?;
        map.end()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Tagged<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TaggedVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for TaggedVisitor<T> {
            type Value = Tagged<T>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping with exactly one type tag")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let (tag, spec) = match map.next_entry::<String, T>()? {
                    Some(entry) => entry,
                    None => return Err(de::Error::invalid_length(0, &self)),
                };

                if map.next_key::<IgnoredAny>()?.is_some() {
                    return Err(de::Error::invalid_length(2, &self));
                }

                Ok(Tagged { tag, spec })
            }
        }

        deserializer.deserialize_map(TaggedVisitor(PhantomData))
    }
}

pub type AssistantEntry = Tagged<AssistantSpec>;
pub type ToolEntry = Tagged<ToolSpec>;

/// Root of a workflow configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowConfig {
    pub workflows: Vec<AssistantEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssistantSpec {
    pub name: String,
    /// Model identifier, e.g. `gpt-4-1106-preview`
    pub llm: String,
    pub prompt: String,
    /// Greeting shown when a conversation starts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intro: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DatasourceSpec>,
}

impl AssistantSpec {
    pub fn tools(&self) -> &[ToolEntry] {
        self.tools.as_deref().unwrap_or_default()
    }

    pub fn urls(&self) -> &[String] {
        self.data
            .as_ref()
            .and_then(|d| d.urls.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolSpec {
    pub name: String,
    /// Alias for the tool description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_for: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasourceSpec {
    /// Alias for the datasource description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_for: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<String>>,
    /// Vector database provider to bind to; the caller's default otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoder: Option<EncoderSpec>,
}

/// Embedding encoder for a datasource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncoderSpec {
    #[serde(rename = "type")]
    pub encoder_type: String,
    pub name: String,
    pub dimensions: u32,
}

/// Parse and validate a YAML workflow configuration.
///
/// Syntax errors are `AppError::Parse`; a document of the wrong shape, or
/// one whose names would make composite-key lookups ambiguous, is
/// `AppError::Validation`.
pub fn parse(text: &str) -> Result<WorkflowConfig, AppError> {
    let document: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|e| AppError::Parse(e.to_string()))?;

    let mut config: WorkflowConfig =
        serde_yaml::from_value(document).map_err(|e| AppError::Validation(e.to_string()))?;

    config.normalize();
    config.validate()?;

    Ok(config)
}

impl WorkflowConfig {
    /// Drop repeated datasource URLs, keeping first appearances
    fn normalize(&mut self) {
        for entry in &mut self.workflows {
            if let Some(urls) = entry.spec.data.as_mut().and_then(|d| d.urls.as_mut()) {
                let mut seen = HashSet::new();
                urls.retain(|url| seen.insert(url.clone()));
            }
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let mut assistant_names = HashSet::new();

        for (index, entry) in self.workflows.iter().enumerate() {
            let assistant = &entry.spec;

            if entry.tag.trim().is_empty() {
                return Err(AppError::Validation(format!(
                    "workflows[{}]: empty assistant type",
                    index
                )));
            }
            if assistant.name.trim().is_empty() {
                return Err(AppError::Validation(format!(
                    "workflows[{}]: assistant name must not be empty",
                    index
                )));
            }
            if assistant.llm.trim().is_empty() {
                return Err(AppError::Validation(format!(
                    "assistant '{}': llm must not be empty",
                    assistant.name
                )));
            }
            if !assistant_names.insert(assistant.name.as_str()) {
                return Err(AppError::Validation(format!(
                    "duplicate assistant name '{}'",
                    assistant.name
                )));
            }

            let mut tool_names = HashSet::new();
            for tool in assistant.tools() {
                if tool.tag.trim().is_empty() || tool.spec.name.trim().is_empty() {
                    return Err(AppError::Validation(format!(
                        "assistant '{}': tools need a type and a name",
                        assistant.name
                    )));
                }
                if !tool_names.insert(tool.spec.name.as_str()) {
                    return Err(AppError::Validation(format!(
                        "assistant '{}': duplicate tool name '{}'",
                        assistant.name, tool.spec.name
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String, AppError> {
        serde_yaml::to_string(self).map_err(|e| AppError::Internal(e.to_string()))
    }

    /// Serialized form kept in the history store
    pub fn to_json(&self) -> Result<String, AppError> {
        serde_json::to_string(self).map_err(|e| AppError::Internal(e.to_string()))
    }

    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        serde_json::from_str(raw)
            .map_err(|e| AppError::Internal(format!("Corrupt configuration snapshot: {}", e)))
    }
}
