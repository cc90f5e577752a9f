//! Relational persistence for workflow configs and their materialized entities.
//!
//! - **Turso/SQLite**: agents, tools, datasources, vector databases and the
//!   workflow config history, all stored through libsql
//! - **`PersistenceGateway`**: the record-oriented API the reconciler talks to

#![allow(missing_docs)]

pub mod traits;
pub mod turso;

// Re-exports
pub use traits::{
    AgentKey, AgentRecord, ChildKey, ConfigHistory, DatabaseProvider, DatasourceRecord,
    FieldChanges, NewAgent, NewDatasource, NewTool, PersistenceGateway, ToolRecord,
    VectorDatabase, WorkflowConfigRecord,
};
pub use turso::TursoClient;
