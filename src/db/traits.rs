//! Persistence gateway abstraction
//!
//! This module provides the `PersistenceGateway` trait that the reconciler
//! talks to. Entities are always located by their composite name key
//! (`name` + owner ids) right before they are mutated; callers never hold on
//! to persisted ids between calls.
//!
//! # Example
//!
//! ```rust,ignore
//! use agentforge::db::{DatabaseProvider, PersistenceGateway};
//!
//! // Use in-memory database (default for development/testing)
//! let db = DatabaseProvider::Memory.create_client().await?;
//!
//! // Use file-based SQLite
//! let db = DatabaseProvider::SQLite { path: "data.db".into() }.create_client().await?;
//! ```

use crate::types::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field-level changes keyed by persistence field name.
///
/// A `null` value clears the field.
pub type FieldChanges = Map<String, Value>;

/// Database provider configuration
#[derive(Debug, Clone, Default)]
pub enum DatabaseProvider {
    /// In-memory SQLite database (ephemeral, lost on restart)
    #[default]
    Memory,
    /// File-based SQLite database
    SQLite {
        /// Path to the SQLite database file
        path: String,
    },
    /// Remote Turso database (requires network access)
    #[cfg(feature = "turso")]
    Turso {
        /// The Turso database URL (e.g., `libsql://your-db.turso.io`)
        url: String,
        /// Authentication token for the Turso database
        auth_token: String,
    },
}

impl DatabaseProvider {
    /// Create a database client from this provider configuration
    pub async fn create_client(&self) -> Result<super::turso::TursoClient> {
        match self {
            DatabaseProvider::Memory => super::turso::TursoClient::new_memory().await,
            DatabaseProvider::SQLite { path } => super::turso::TursoClient::new_local(path).await,
            #[cfg(feature = "turso")]
            DatabaseProvider::Turso { url, auth_token } => {
                super::turso::TursoClient::new_remote(url.clone(), auth_token.clone()).await
            }
        }
    }

    /// Pick a provider from a configured url plus optional remote credentials
    pub fn from_url(url: &str, remote: Option<(String, String)>) -> Self {
        // Remote credentials win when both are present
        #[cfg(feature = "turso")]
        {
            if let Some((url, auth_token)) = remote {
                if !url.is_empty() && !auth_token.is_empty() {
                    return DatabaseProvider::Turso { url, auth_token };
                }
            }
        }
        #[cfg(not(feature = "turso"))]
        let _ = remote;

        if url.is_empty() || url == ":memory:" {
            DatabaseProvider::Memory
        } else {
            DatabaseProvider::SQLite {
                path: url.to_string(),
            }
        }
    }
}

// ============== Records ==============

/// A persisted agent (the materialized form of an assistant entry)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: String,
    pub name: String,
    pub workflow_config_id: String,
    pub api_user_id: String,
    pub agent_type: String,
    pub prompt: Option<String>,
    pub llm_model: Option<String>,
    pub llm_provider: Option<String>,
    pub initial_message: Option<String>,
    pub metadata: Option<Value>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields for a new agent, in persistence shape
#[derive(Debug, Clone, PartialEq)]
pub struct NewAgent {
    pub workflow_config_id: String,
    pub api_user_id: String,
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRecord {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub tool_type: String,
    pub metadata: Option<Value>,
    pub workflow_config_id: String,
    pub agent_id: String,
    pub api_user_id: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTool {
    pub workflow_config_id: String,
    pub agent_id: String,
    pub api_user_id: String,
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasourceRecord {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub datasource_type: String,
    pub url: String,
    pub metadata: Option<Value>,
    pub vector_db_id: Option<String>,
    pub workflow_config_id: String,
    pub agent_id: String,
    pub api_user_id: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDatasource {
    pub name: String,
    pub description: Option<String>,
    pub datasource_type: String,
    pub url: String,
    pub metadata: Option<Value>,
    pub vector_db_id: Option<String>,
    pub workflow_config_id: String,
    pub agent_id: String,
    pub api_user_id: String,
}

/// A vector database registered by an API user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorDatabase {
    pub id: String,
    pub api_user_id: String,
    pub provider: String,
    pub options: Map<String, Value>,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfigRecord {
    pub id: String,
    pub api_user_id: String,
    pub description: Option<String>,
    pub latest_history_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Immutable snapshot of an applied configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigHistory {
    pub id: String,
    pub workflow_config_id: String,
    pub config_file: String,
    pub created_at: i64,
}

// ============== Lookup keys ==============

/// Composite key of an agent inside a workflow config
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentKey<'a> {
    pub name: &'a str,
    pub workflow_config_id: &'a str,
    pub api_user_id: &'a str,
}

/// Composite key of a tool or datasource owned by an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildKey<'a> {
    pub name: &'a str,
    pub workflow_config_id: &'a str,
    pub agent_id: &'a str,
    pub api_user_id: &'a str,
}

/// Record-oriented CRUD API consumed by the reconciler.
///
/// Every method is an independent, atomic operation; there is no
/// cross-entity transaction.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    // ============== Agent Operations ==============

    /// Create an agent from persistence-shaped fields
    async fn create_agent(&self, agent: &NewAgent) -> Result<AgentRecord>;

    /// Locate an agent by composite key
    async fn find_agent(&self, key: AgentKey<'_>) -> Result<Option<AgentRecord>>;

    /// Apply field changes to an agent
    async fn update_agent(&self, id: &str, changes: &FieldChanges) -> Result<AgentRecord>;

    /// Delete an agent and its associations
    async fn delete_agent(&self, id: &str) -> Result<()>;

    // ============== Tool Operations ==============

    async fn create_tool(&self, tool: &NewTool) -> Result<ToolRecord>;

    async fn find_tool(&self, key: ChildKey<'_>) -> Result<Option<ToolRecord>>;

    async fn update_tool(&self, id: &str, changes: &FieldChanges) -> Result<ToolRecord>;

    async fn delete_tool(&self, id: &str) -> Result<()>;

    /// Associate an existing tool with an agent
    async fn attach_tool(&self, agent_id: &str, tool_id: &str) -> Result<()>;

    // ============== Datasource Operations ==============

    async fn create_datasource(&self, datasource: &NewDatasource) -> Result<DatasourceRecord>;

    async fn find_datasource(&self, key: ChildKey<'_>) -> Result<Option<DatasourceRecord>>;

    async fn delete_datasource(&self, id: &str) -> Result<()>;

    /// Associate an existing datasource with an agent
    async fn attach_datasource(&self, agent_id: &str, datasource_id: &str) -> Result<()>;

    // ============== Vector Database Operations ==============

    async fn create_vector_database(
        &self,
        api_user_id: &str,
        provider: &str,
        options: &Map<String, Value>,
    ) -> Result<VectorDatabase>;

    /// Find a vector database for the user, by provider when given,
    /// otherwise the user's earliest registered one
    async fn find_vector_database(
        &self,
        api_user_id: &str,
        provider: Option<&str>,
    ) -> Result<Option<VectorDatabase>>;

    // ============== Workflow Config Operations ==============

    async fn create_workflow_config(
        &self,
        api_user_id: &str,
        description: Option<&str>,
    ) -> Result<WorkflowConfigRecord>;

    async fn get_workflow_config(&self, id: &str) -> Result<Option<WorkflowConfigRecord>>;

    /// Point a workflow config at its most recent history row
    async fn set_latest_history(&self, workflow_config_id: &str, history_id: &str) -> Result<()>;

    // ============== History Operations ==============

    async fn create_history(
        &self,
        workflow_config_id: &str,
        config_file: &str,
    ) -> Result<ConfigHistory>;

    async fn get_history(
        &self,
        workflow_config_id: &str,
        history_id: &str,
    ) -> Result<Option<ConfigHistory>>;

    /// All history rows of a workflow config, newest first
    async fn list_history(&self, workflow_config_id: &str) -> Result<Vec<ConfigHistory>>;
}
