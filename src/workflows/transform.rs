//! Field normalization between the declarative schema and the persistence
//! schema.

use crate::db::{NewDatasource, PersistenceGateway};
use crate::types::{AppError, Result};
use crate::utils::toml_config::{EncoderConfig, ForgeConfig, LlmModelConfig};
use crate::workflows::schema::{AssistantSpec, DatasourceSpec, EncoderSpec, ToolSpec};
use crate::workflows::sniff::ContentTypeSniffer;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Lookup tables used while transforming
#[derive(Debug, Clone)]
pub struct TransformMappings {
    pub llm_models: HashMap<String, LlmModelConfig>,
    pub mime_types: HashMap<String, String>,
    pub default_encoder: EncoderSpec,
}

impl TransformMappings {
    pub fn from_config(config: &ForgeConfig) -> Self {
        Self {
            llm_models: config.llm_models.clone(),
            mime_types: config.mime_types.clone(),
            default_encoder: EncoderSpec::from(&config.datasources.default_encoder),
        }
    }
}

impl Default for TransformMappings {
    fn default() -> Self {
        Self::from_config(&ForgeConfig::default())
    }
}

impl From<&EncoderConfig> for EncoderSpec {
    fn from(config: &EncoderConfig) -> Self {
        Self {
            encoder_type: config.encoder_type.clone(),
            name: config.name.clone(),
            dimensions: config.dimensions,
        }
    }
}

/// One sniffed document of a datasource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasourceFile {
    pub file_type: String,
    pub url: String,
}

/// Vector database a datasource is bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorDatabaseBinding {
    pub id: String,
    pub provider: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformedDatasource {
    pub description: Option<String>,
    pub files: Vec<DatasourceFile>,
    pub vector_database: VectorDatabaseBinding,
    pub encoder: EncoderSpec,
    /// URLs whose content type could not be mapped
    pub skipped: Vec<String>,
}

impl TransformedDatasource {
    /// Persistence record for one file; the URL doubles as the datasource name
    pub fn new_datasource(
        &self,
        file: &DatasourceFile,
        workflow_config_id: &str,
        agent_id: &str,
        api_user_id: &str,
    ) -> NewDatasource {
        NewDatasource {
            name: file.url.clone(),
            description: self.description.clone(),
            datasource_type: file.file_type.clone(),
            url: file.url.clone(),
            metadata: Some(json!({
                "encoder": {
                    "type": self.encoder.encoder_type,
                    "name": self.encoder.name,
                    "dimensions": self.encoder.dimensions,
                },
                "vectorDatabase": {
                    "type": self.vector_database.provider,
                },
            })),
            vector_db_id: Some(self.vector_database.id.clone()),
            workflow_config_id: workflow_config_id.to_string(),
            agent_id: agent_id.to_string(),
            api_user_id: api_user_id.to_string(),
        }
    }
}

pub struct DataTransformer {
    mappings: TransformMappings,
    sniffer: Arc<dyn ContentTypeSniffer>,
}

impl DataTransformer {
    pub fn new(mappings: TransformMappings, sniffer: Arc<dyn ContentTypeSniffer>) -> Self {
        Self { mappings, sniffer }
    }

    pub fn mappings(&self) -> &TransformMappings {
        &self.mappings
    }

    /// Tool fields in persistence shape.
    ///
    /// `FUNCTION` tools get `metadata.functionName`; keys the user set in
    /// `metadata` take precedence.
    pub fn transform_tool(tool: &ToolSpec, tool_type: &str) -> Map<String, Value> {
        let mut fields = Map::new();
        let tool_type = tool_type.to_uppercase();

        fields.insert("name".into(), Value::String(tool.name.clone()));
        if let Some(description) = &tool.use_for {
            fields.insert("description".into(), Value::String(description.clone()));
        }

        let metadata = if tool_type == "FUNCTION" {
            let mut metadata = Map::new();
            metadata.insert("functionName".into(), Value::String(tool.name.clone()));
            metadata.extend(tool.metadata.clone().unwrap_or_default());
            Some(metadata)
        } else {
            tool.metadata.clone()
        };
        if let Some(metadata) = metadata {
            fields.insert("metadata".into(), Value::Object(metadata));
        }

        fields.insert("type".into(), Value::String(tool_type));
        fields
    }

    /// Assistant fields in persistence shape; `tools` and `data` are left out.
    ///
    /// Known model identifiers resolve to a provider and a persistence model
    /// id. Unknown ones are kept verbatim with no provider. `LLM` assistants
    /// carry the model in `metadata.model` instead of `llmModel`.
    pub fn transform_assistant(
        &self,
        assistant: &AssistantSpec,
        assistant_type: &str,
    ) -> Map<String, Value> {
        let mut fields = Map::new();
        let assistant_type = assistant_type.to_uppercase();

        fields.insert("name".into(), Value::String(assistant.name.clone()));
        fields.insert("prompt".into(), Value::String(assistant.prompt.clone()));
        if let Some(intro) = &assistant.intro {
            fields.insert("initialMessage".into(), Value::String(intro.clone()));
        }

        let known = self.mappings.llm_models.get(&assistant.llm);
        if let Some(model) = known {
            fields.insert("llmProvider".into(), Value::String(model.provider.clone()));
        }

        if assistant_type == "LLM" {
            fields.insert("metadata".into(), json!({ "model": assistant.llm }));
        } else {
            let llm_model = known
                .map(|m| m.model.clone())
                .unwrap_or_else(|| assistant.llm.clone());
            fields.insert("llmModel".into(), Value::String(llm_model));
        }

        fields.insert("type".into(), Value::String(assistant_type));
        fields
    }

    /// Bind a datasource to a vector database and sniff the given URLs.
    ///
    /// Fails with `MissingVectorDatabaseProvider` before any URL is touched
    /// when no vector database can be resolved. URLs with an unmapped or
    /// undeterminable content type are skipped with a warning.
    pub async fn transform_datasource(
        &self,
        gateway: &dyn PersistenceGateway,
        api_user_id: &str,
        datasource: &DatasourceSpec,
        urls: &[String],
    ) -> Result<TransformedDatasource> {
        let provider = datasource.database_provider.as_deref();
        let database = gateway
            .find_vector_database(api_user_id, provider)
            .await?
            .ok_or_else(|| {
                AppError::MissingVectorDatabaseProvider(match provider {
                    Some(provider) => format!(
                        "provider '{}' is not registered for this user",
                        provider
                    ),
                    None => "register a vector database before adding datasources".to_string(),
                })
            })?;

        let mut files = Vec::new();
        let mut skipped = Vec::new();

        for url in urls {
            let mime = self.sniffer.content_type(url).await;
            match mime.as_ref().and_then(|m| self.mappings.mime_types.get(m)) {
                Some(file_type) => files.push(DatasourceFile {
                    file_type: file_type.clone(),
                    url: url.clone(),
                }),
                None => {
                    warn!(url = %url, mime = ?mime, "Could not determine file type, skipping");
                    skipped.push(url.clone());
                }
            }
        }

        Ok(TransformedDatasource {
            description: datasource.use_for.clone(),
            files,
            vector_database: VectorDatabaseBinding {
                id: database.id,
                provider: database.provider,
            },
            encoder: datasource
                .encoder
                .clone()
                .unwrap_or_else(|| self.mappings.default_encoder.clone()),
            skipped,
        })
    }
}
