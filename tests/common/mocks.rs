//! Test doubles for the persistence gateway and the content-type sniffer.
//!
//! `RecordingGateway` keeps every entity in memory and records each write
//! as a short string (`create_agent:Support`, `delete_tool:Support/search`)
//! so tests can assert on the exact order of calls.

use agentforge::db::{
    AgentKey, AgentRecord, ChildKey, ConfigHistory, DatasourceRecord, FieldChanges, NewAgent,
    NewDatasource, NewTool, PersistenceGateway, ToolRecord, VectorDatabase, WorkflowConfigRecord,
};
use agentforge::types::{AppError, Result};
use agentforge::workflows::ContentTypeSniffer;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;

#[derive(Default)]
struct Store {
    agents: Vec<AgentRecord>,
    tools: Vec<ToolRecord>,
    datasources: Vec<DatasourceRecord>,
    vector_databases: Vec<VectorDatabase>,
    workflow_configs: Vec<WorkflowConfigRecord>,
    history: Vec<ConfigHistory>,
    agent_tools: Vec<(String, String)>,
    agent_datasources: Vec<(String, String)>,
}

/// In-memory gateway that records every write call.
#[derive(Default)]
pub struct RecordingGateway {
    store: Mutex<Store>,
    calls: Mutex<Vec<String>>,
    fail_on: Mutex<Option<String>>,
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn text(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    }
}

fn json(fields: &Map<String, Value>, key: &str) -> Option<Value> {
    fields.get(key).filter(|v| !v.is_null()).cloned()
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first write whose recorded call starts with `prefix`
    pub fn fail_on(&self, prefix: &str) {
        *self.fail_on.lock() = Some(prefix.to_string());
    }

    /// Recorded writes, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn agents(&self) -> Vec<AgentRecord> {
        self.store.lock().agents.clone()
    }

    pub fn tools(&self) -> Vec<ToolRecord> {
        self.store.lock().tools.clone()
    }

    pub fn datasources(&self) -> Vec<DatasourceRecord> {
        self.store.lock().datasources.clone()
    }

    pub fn attached_tools(&self) -> Vec<(String, String)> {
        self.store.lock().agent_tools.clone()
    }

    /// Register a vector database without recording a call
    pub fn seed_vector_database(&self, api_user_id: &str, provider: &str) -> VectorDatabase {
        let database = VectorDatabase {
            id: new_id(),
            api_user_id: api_user_id.to_string(),
            provider: provider.to_uppercase(),
            options: Map::new(),
            created_at: now(),
        };
        self.store.lock().vector_databases.push(database.clone());
        database
    }

    fn record(&self, call: String) -> Result<()> {
        let mut fail_on = self.fail_on.lock();
        if fail_on.as_deref().is_some_and(|p| call.starts_with(p)) {
            *fail_on = None;
            return Err(AppError::Gateway(format!("Injected failure on {}", call)));
        }
        self.calls.lock().push(call);
        Ok(())
    }

    fn agent_name(&self, id: &str) -> String {
        self.store
            .lock()
            .agents
            .iter()
            .find(|a| a.id == id)
            .map(|a| a.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    fn tool_label(&self, id: &str) -> Option<(String, String)> {
        let store = self.store.lock();
        store
            .tools
            .iter()
            .find(|t| t.id == id)
            .map(|t| (t.agent_id.clone(), t.name.clone()))
    }

    fn datasource_label(&self, id: &str) -> Option<(String, String)> {
        let store = self.store.lock();
        store
            .datasources
            .iter()
            .find(|d| d.id == id)
            .map(|d| (d.agent_id.clone(), d.url.clone()))
    }
}

#[async_trait]
impl PersistenceGateway for RecordingGateway {
    async fn create_agent(&self, agent: &NewAgent) -> Result<AgentRecord> {
        let name = text(&agent.fields, "name").unwrap_or_default();
        self.record(format!("create_agent:{}", name))?;

        let record = AgentRecord {
            id: new_id(),
            name,
            workflow_config_id: agent.workflow_config_id.clone(),
            api_user_id: agent.api_user_id.clone(),
            agent_type: text(&agent.fields, "type").unwrap_or_default(),
            prompt: text(&agent.fields, "prompt"),
            llm_model: text(&agent.fields, "llmModel"),
            llm_provider: text(&agent.fields, "llmProvider"),
            initial_message: text(&agent.fields, "initialMessage"),
            metadata: json(&agent.fields, "metadata"),
            created_at: now(),
            updated_at: now(),
        };
        self.store.lock().agents.push(record.clone());
        Ok(record)
    }

    async fn find_agent(&self, key: AgentKey<'_>) -> Result<Option<AgentRecord>> {
        Ok(self
            .store
            .lock()
            .agents
            .iter()
            .find(|a| {
                a.name == key.name
                    && a.workflow_config_id == key.workflow_config_id
                    && a.api_user_id == key.api_user_id
            })
            .cloned())
    }

    async fn update_agent(&self, id: &str, changes: &FieldChanges) -> Result<AgentRecord> {
        self.record(format!("update_agent:{}", self.agent_name(id)))?;

        let mut store = self.store.lock();
        let agent = store
            .agents
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Agent {}", id)))?;

        for key in changes.keys() {
            match key.as_str() {
                "name" => agent.name = text(changes, key).unwrap_or_default(),
                "type" => agent.agent_type = text(changes, key).unwrap_or_default(),
                "prompt" => agent.prompt = text(changes, key),
                "llmModel" => agent.llm_model = text(changes, key),
                "llmProvider" => agent.llm_provider = text(changes, key),
                "initialMessage" => agent.initial_message = text(changes, key),
                "metadata" => agent.metadata = json(changes, key),
                other => {
                    return Err(AppError::InvalidInput(format!("Unknown agent field {}", other)))
                }
            }
        }
        agent.updated_at = now();
        Ok(agent.clone())
    }

    async fn delete_agent(&self, id: &str) -> Result<()> {
        self.record(format!("delete_agent:{}", self.agent_name(id)))?;

        let mut store = self.store.lock();
        store.agents.retain(|a| a.id != id);
        store.agent_tools.retain(|(agent, _)| agent != id);
        store.agent_datasources.retain(|(agent, _)| agent != id);
        Ok(())
    }

    async fn create_tool(&self, tool: &NewTool) -> Result<ToolRecord> {
        let name = text(&tool.fields, "name").unwrap_or_default();
        self.record(format!(
            "create_tool:{}/{}",
            self.agent_name(&tool.agent_id),
            name
        ))?;

        let record = ToolRecord {
            id: new_id(),
            name,
            description: text(&tool.fields, "description"),
            tool_type: text(&tool.fields, "type").unwrap_or_default(),
            metadata: json(&tool.fields, "metadata"),
            workflow_config_id: tool.workflow_config_id.clone(),
            agent_id: tool.agent_id.clone(),
            api_user_id: tool.api_user_id.clone(),
            created_at: now(),
            updated_at: now(),
        };
        self.store.lock().tools.push(record.clone());
        Ok(record)
    }

    async fn find_tool(&self, key: ChildKey<'_>) -> Result<Option<ToolRecord>> {
        Ok(self
            .store
            .lock()
            .tools
            .iter()
            .find(|t| {
                t.name == key.name
                    && t.agent_id == key.agent_id
                    && t.workflow_config_id == key.workflow_config_id
                    && t.api_user_id == key.api_user_id
            })
            .cloned())
    }

    async fn update_tool(&self, id: &str, changes: &FieldChanges) -> Result<ToolRecord> {
        let (agent_id, name) = self
            .tool_label(id)
            .ok_or_else(|| AppError::NotFound(format!("Tool {}", id)))?;
        self.record(format!("update_tool:{}/{}", self.agent_name(&agent_id), name))?;

        let mut store = self.store.lock();
        let tool = store
            .tools
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Tool {}", id)))?;

        for key in changes.keys() {
            match key.as_str() {
                "name" => tool.name = text(changes, key).unwrap_or_default(),
                "type" => tool.tool_type = text(changes, key).unwrap_or_default(),
                "description" => tool.description = text(changes, key),
                "metadata" => tool.metadata = json(changes, key),
                other => {
                    return Err(AppError::InvalidInput(format!("Unknown tool field {}", other)))
                }
            }
        }
        tool.updated_at = now();
        Ok(tool.clone())
    }

    async fn delete_tool(&self, id: &str) -> Result<()> {
        let (agent_id, name) = self
            .tool_label(id)
            .ok_or_else(|| AppError::NotFound(format!("Tool {}", id)))?;
        self.record(format!("delete_tool:{}/{}", self.agent_name(&agent_id), name))?;

        let mut store = self.store.lock();
        store.tools.retain(|t| t.id != id);
        store.agent_tools.retain(|(_, tool)| tool != id);
        Ok(())
    }

    async fn attach_tool(&self, agent_id: &str, tool_id: &str) -> Result<()> {
        let name = self.tool_label(tool_id).map(|(_, n)| n).unwrap_or_default();
        self.record(format!("attach_tool:{}/{}", self.agent_name(agent_id), name))?;

        self.store
            .lock()
            .agent_tools
            .push((agent_id.to_string(), tool_id.to_string()));
        Ok(())
    }

    async fn create_datasource(&self, datasource: &NewDatasource) -> Result<DatasourceRecord> {
        self.record(format!(
            "create_datasource:{}/{}",
            self.agent_name(&datasource.agent_id),
            datasource.url
        ))?;

        let record = DatasourceRecord {
            id: new_id(),
            name: datasource.name.clone(),
            description: datasource.description.clone(),
            datasource_type: datasource.datasource_type.clone(),
            url: datasource.url.clone(),
            metadata: datasource.metadata.clone(),
            vector_db_id: datasource.vector_db_id.clone(),
            workflow_config_id: datasource.workflow_config_id.clone(),
            agent_id: datasource.agent_id.clone(),
            api_user_id: datasource.api_user_id.clone(),
            created_at: now(),
        };
        self.store.lock().datasources.push(record.clone());
        Ok(record)
    }

    async fn find_datasource(&self, key: ChildKey<'_>) -> Result<Option<DatasourceRecord>> {
        Ok(self
            .store
            .lock()
            .datasources
            .iter()
            .find(|d| {
                d.name == key.name
                    && d.agent_id == key.agent_id
                    && d.workflow_config_id == key.workflow_config_id
                    && d.api_user_id == key.api_user_id
            })
            .cloned())
    }

    async fn delete_datasource(&self, id: &str) -> Result<()> {
        let (agent_id, url) = self
            .datasource_label(id)
            .ok_or_else(|| AppError::NotFound(format!("Datasource {}", id)))?;
        self.record(format!(
            "delete_datasource:{}/{}",
            self.agent_name(&agent_id),
            url
        ))?;

        let mut store = self.store.lock();
        store.datasources.retain(|d| d.id != id);
        store.agent_datasources.retain(|(_, ds)| ds != id);
        Ok(())
    }

    async fn attach_datasource(&self, agent_id: &str, datasource_id: &str) -> Result<()> {
        let url = self
            .datasource_label(datasource_id)
            .map(|(_, u)| u)
            .unwrap_or_default();
        self.record(format!(
            "attach_datasource:{}/{}",
            self.agent_name(agent_id),
            url
        ))?;

        self.store
            .lock()
            .agent_datasources
            .push((agent_id.to_string(), datasource_id.to_string()));
        Ok(())
    }

    async fn create_vector_database(
        &self,
        api_user_id: &str,
        provider: &str,
        options: &Map<String, Value>,
    ) -> Result<VectorDatabase> {
        self.record(format!("create_vector_database:{}", provider))?;

        let database = VectorDatabase {
            id: new_id(),
            api_user_id: api_user_id.to_string(),
            provider: provider.to_uppercase(),
            options: options.clone(),
            created_at: now(),
        };
        self.store.lock().vector_databases.push(database.clone());
        Ok(database)
    }

    async fn find_vector_database(
        &self,
        api_user_id: &str,
        provider: Option<&str>,
    ) -> Result<Option<VectorDatabase>> {
        let provider = provider.map(str::to_uppercase);
        Ok(self
            .store
            .lock()
            .vector_databases
            .iter()
            .find(|db| {
                db.api_user_id == api_user_id
                    && provider.as_ref().is_none_or(|p| &db.provider == p)
            })
            .cloned())
    }

    async fn create_workflow_config(
        &self,
        api_user_id: &str,
        description: Option<&str>,
    ) -> Result<WorkflowConfigRecord> {
        self.record("create_workflow_config".to_string())?;

        let record = WorkflowConfigRecord {
            id: new_id(),
            api_user_id: api_user_id.to_string(),
            description: description.map(str::to_string),
            latest_history_id: None,
            created_at: now(),
            updated_at: now(),
        };
        self.store.lock().workflow_configs.push(record.clone());
        Ok(record)
    }

    async fn get_workflow_config(&self, id: &str) -> Result<Option<WorkflowConfigRecord>> {
        Ok(self
            .store
            .lock()
            .workflow_configs
            .iter()
            .find(|wc| wc.id == id)
            .cloned())
    }

    async fn set_latest_history(&self, workflow_config_id: &str, history_id: &str) -> Result<()> {
        self.record("set_latest_history".to_string())?;

        let mut store = self.store.lock();
        let record = store
            .workflow_configs
            .iter_mut()
            .find(|wc| wc.id == workflow_config_id)
            .ok_or_else(|| AppError::NotFound(format!("Workflow config {}", workflow_config_id)))?;
        record.latest_history_id = Some(history_id.to_string());
        Ok(())
    }

    async fn create_history(
        &self,
        workflow_config_id: &str,
        config_file: &str,
    ) -> Result<ConfigHistory> {
        self.record("create_history".to_string())?;

        let history = ConfigHistory {
            id: new_id(),
            workflow_config_id: workflow_config_id.to_string(),
            config_file: config_file.to_string(),
            created_at: now(),
        };
        self.store.lock().history.push(history.clone());
        Ok(history)
    }

    async fn get_history(
        &self,
        workflow_config_id: &str,
        history_id: &str,
    ) -> Result<Option<ConfigHistory>> {
        Ok(self
            .store
            .lock()
            .history
            .iter()
            .find(|h| h.id == history_id && h.workflow_config_id == workflow_config_id)
            .cloned())
    }

    async fn list_history(&self, workflow_config_id: &str) -> Result<Vec<ConfigHistory>> {
        Ok(self
            .store
            .lock()
            .history
            .iter()
            .rev()
            .filter(|h| h.workflow_config_id == workflow_config_id)
            .cloned()
            .collect())
    }
}

/// Sniffer answering from a fixed URL to MIME type table
#[derive(Default)]
pub struct StaticSniffer {
    types: HashMap<String, String>,
}

impl StaticSniffer {
    pub fn new<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            types: entries
                .into_iter()
                .map(|(url, mime)| (url.to_string(), mime.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl ContentTypeSniffer for StaticSniffer {
    async fn content_type(&self, url: &str) -> Option<String> {
        self.types.get(url).cloned()
    }
}
