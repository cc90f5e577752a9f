use crate::db::traits::{
    AgentKey, AgentRecord, ChildKey, ConfigHistory, DatasourceRecord, FieldChanges, NewAgent,
    NewDatasource, NewTool, PersistenceGateway, ToolRecord, VectorDatabase, WorkflowConfigRecord,
};
use crate::types::{AppError, Result};
use async_trait::async_trait;
use chrono::Utc;
use libsql::params::Params;
use libsql::{Builder, Connection, Database, Row, Value as SqlValue};
use serde_json::{Map, Value};
use uuid::Uuid;

pub struct TursoClient {
    #[allow(dead_code)]
    db: Database,
    // A single shared connection: every connect() on an in-memory database
    // opens a fresh, empty database.
    conn: Connection,
}

/// How a persistence field is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Text,
    Json,
}

/// Persistence field name → column
struct Column {
    field: &'static str,
    column: &'static str,
    kind: ColumnKind,
}

const AGENT_COLUMNS: &[Column] = &[
    Column { field: "name", column: "name", kind: ColumnKind::Text },
    Column { field: "type", column: "agent_type", kind: ColumnKind::Text },
    Column { field: "prompt", column: "prompt", kind: ColumnKind::Text },
    Column { field: "llmModel", column: "llm_model", kind: ColumnKind::Text },
    Column { field: "llmProvider", column: "llm_provider", kind: ColumnKind::Text },
    Column { field: "initialMessage", column: "initial_message", kind: ColumnKind::Text },
    Column { field: "metadata", column: "metadata", kind: ColumnKind::Json },
];

const TOOL_COLUMNS: &[Column] = &[
    Column { field: "name", column: "name", kind: ColumnKind::Text },
    Column { field: "description", column: "description", kind: ColumnKind::Text },
    Column { field: "type", column: "tool_type", kind: ColumnKind::Text },
    Column { field: "metadata", column: "metadata", kind: ColumnKind::Json },
];

const AGENT_SELECT: &str = "SELECT id, name, workflow_config_id, api_user_id, agent_type, prompt,
        llm_model, llm_provider, initial_message, metadata, created_at, updated_at
     FROM agents";

const TOOL_SELECT: &str = "SELECT id, name, description, tool_type, metadata, workflow_config_id,
        agent_id, api_user_id, created_at, updated_at
     FROM tools";

const DATASOURCE_SELECT: &str = "SELECT id, name, description, datasource_type, url, metadata,
        vector_db_id, workflow_config_id, agent_id, api_user_id, created_at
     FROM datasources";

fn db_err(e: libsql::Error) -> AppError {
    AppError::Gateway(e.to_string())
}

fn text(row: &Row, idx: i32) -> Result<String> {
    row.get::<String>(idx).map_err(db_err)
}

fn int(row: &Row, idx: i32) -> Result<i64> {
    row.get::<i64>(idx).map_err(db_err)
}

fn opt_text(row: &Row, idx: i32) -> Result<Option<String>> {
    match row.get_value(idx).map_err(db_err)? {
        SqlValue::Null => Ok(None),
        SqlValue::Text(s) => Ok(Some(s)),
        other => Err(AppError::Gateway(format!(
            "Unexpected value in column {}: {:?}",
            idx, other
        ))),
    }
}

fn opt_json(row: &Row, idx: i32) -> Result<Option<Value>> {
    opt_text(row, idx)?
        .map(|raw| {
            serde_json::from_str(&raw)
                .map_err(|e| AppError::Gateway(format!("Corrupt JSON in column {}: {}", idx, e)))
        })
        .transpose()
}

fn to_sql_value(value: &Value, kind: ColumnKind) -> Result<SqlValue> {
    Ok(match (value, kind) {
        (Value::Null, _) => SqlValue::Null,
        (Value::String(s), ColumnKind::Text) => SqlValue::Text(s.clone()),
        (Value::Bool(_) | Value::Number(_), ColumnKind::Text) => SqlValue::Text(value.to_string()),
        (_, ColumnKind::Text) => {
            return Err(AppError::InvalidInput(format!(
                "Expected a scalar value, got {}",
                value
            )))
        }
        (_, ColumnKind::Json) => SqlValue::Text(
            serde_json::to_string(value).map_err(|e| AppError::Internal(e.to_string()))?,
        ),
    })
}

/// Map persistence-shaped fields onto columns, rejecting unknown fields
fn bind_fields(
    fields: &Map<String, Value>,
    columns: &[Column],
    entity: &str,
) -> Result<Vec<(&'static str, SqlValue)>> {
    fields
        .iter()
        .map(|(field, value)| {
            let column = columns
                .iter()
                .find(|c| c.field == field)
                .ok_or_else(|| {
                    AppError::InvalidInput(format!("Unknown {} field '{}'", entity, field))
                })?;
            Ok((column.column, to_sql_value(value, column.kind)?))
        })
        .collect()
}

fn require_text(fields: &Map<String, Value>, field: &str, entity: &str) -> Result<()> {
    match fields.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(()),
        _ => Err(AppError::InvalidInput(format!(
            "{} requires a non-empty '{}'",
            entity, field
        ))),
    }
}

fn agent_from_row(row: &Row) -> Result<AgentRecord> {
    Ok(AgentRecord {
        id: text(row, 0)?,
        name: text(row, 1)?,
        workflow_config_id: text(row, 2)?,
        api_user_id: text(row, 3)?,
        agent_type: text(row, 4)?,
        prompt: opt_text(row, 5)?,
        llm_model: opt_text(row, 6)?,
        llm_provider: opt_text(row, 7)?,
        initial_message: opt_text(row, 8)?,
        metadata: opt_json(row, 9)?,
        created_at: int(row, 10)?,
        updated_at: int(row, 11)?,
    })
}

fn tool_from_row(row: &Row) -> Result<ToolRecord> {
    Ok(ToolRecord {
        id: text(row, 0)?,
        name: text(row, 1)?,
        description: opt_text(row, 2)?,
        tool_type: text(row, 3)?,
        metadata: opt_json(row, 4)?,
        workflow_config_id: text(row, 5)?,
        agent_id: text(row, 6)?,
        api_user_id: text(row, 7)?,
        created_at: int(row, 8)?,
        updated_at: int(row, 9)?,
    })
}

fn datasource_from_row(row: &Row) -> Result<DatasourceRecord> {
    Ok(DatasourceRecord {
        id: text(row, 0)?,
        name: text(row, 1)?,
        description: opt_text(row, 2)?,
        datasource_type: text(row, 3)?,
        url: text(row, 4)?,
        metadata: opt_json(row, 5)?,
        vector_db_id: opt_text(row, 6)?,
        workflow_config_id: text(row, 7)?,
        agent_id: text(row, 8)?,
        api_user_id: text(row, 9)?,
        created_at: int(row, 10)?,
    })
}

fn vector_database_from_row(row: &Row) -> Result<VectorDatabase> {
    let options = match opt_json(row, 3)? {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };

    Ok(VectorDatabase {
        id: text(row, 0)?,
        api_user_id: text(row, 1)?,
        provider: text(row, 2)?,
        options,
        created_at: int(row, 4)?,
    })
}

fn workflow_config_from_row(row: &Row) -> Result<WorkflowConfigRecord> {
    Ok(WorkflowConfigRecord {
        id: text(row, 0)?,
        api_user_id: text(row, 1)?,
        description: opt_text(row, 2)?,
        latest_history_id: opt_text(row, 3)?,
        created_at: int(row, 4)?,
        updated_at: int(row, 5)?,
    })
}

fn history_from_row(row: &Row) -> Result<ConfigHistory> {
    Ok(ConfigHistory {
        id: text(row, 0)?,
        workflow_config_id: text(row, 1)?,
        config_file: text(row, 2)?,
        created_at: int(row, 3)?,
    })
}

impl TursoClient {
    /// Connect to a remote Turso database
    pub async fn new_remote(url: String, auth_token: String) -> Result<Self> {
        let db = Builder::new_remote(url, auth_token)
            .build()
            .await
            .map_err(|e| AppError::Gateway(format!("Failed to connect to Turso: {}", e)))?;

        Self::from_database(db).await
    }

    /// Open (or create) a local SQLite file
    pub async fn new_local(path: &str) -> Result<Self> {
        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(|e| AppError::Gateway(format!("Failed to open database {}: {}", path, e)))?;

        Self::from_database(db).await
    }

    /// Ephemeral in-memory database, used for development and tests
    pub async fn new_memory() -> Result<Self> {
        Self::new_local(":memory:").await
    }

    async fn from_database(db: Database) -> Result<Self> {
        let conn = db
            .connect()
            .map_err(|e| AppError::Gateway(format!("Failed to get connection: {}", e)))?;

        let client = Self { db, conn };
        client.initialize_schema().await?;

        Ok(client)
    }

    pub fn connection(&self) -> Result<Connection> {
        Ok(self.conn.clone())
    }

    async fn initialize_schema(&self) -> Result<()> {
        let conn = self.connection()?;

        let statements = [
            (
                "workflow_configs",
                "CREATE TABLE IF NOT EXISTS workflow_configs (
                    id TEXT PRIMARY KEY,
                    api_user_id TEXT NOT NULL,
                    description TEXT,
                    latest_history_id TEXT,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL
                )",
            ),
            (
                "workflow_config_history",
                "CREATE TABLE IF NOT EXISTS workflow_config_history (
                    id TEXT PRIMARY KEY,
                    workflow_config_id TEXT NOT NULL,
                    config_file TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    FOREIGN KEY (workflow_config_id) REFERENCES workflow_configs(id)
                )",
            ),
            (
                "agents",
                "CREATE TABLE IF NOT EXISTS agents (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    workflow_config_id TEXT NOT NULL,
                    api_user_id TEXT NOT NULL,
                    agent_type TEXT NOT NULL,
                    prompt TEXT,
                    llm_model TEXT,
                    llm_provider TEXT,
                    initial_message TEXT,
                    metadata TEXT,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL
                )",
            ),
            (
                "tools",
                "CREATE TABLE IF NOT EXISTS tools (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    description TEXT,
                    tool_type TEXT NOT NULL,
                    metadata TEXT,
                    workflow_config_id TEXT NOT NULL,
                    agent_id TEXT NOT NULL,
                    api_user_id TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL
                )",
            ),
            (
                "datasources",
                "CREATE TABLE IF NOT EXISTS datasources (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    description TEXT,
                    datasource_type TEXT NOT NULL,
                    url TEXT NOT NULL,
                    metadata TEXT,
                    vector_db_id TEXT,
                    workflow_config_id TEXT NOT NULL,
                    agent_id TEXT NOT NULL,
                    api_user_id TEXT NOT NULL,
                    created_at INTEGER NOT NULL
                )",
            ),
            (
                "agent_tools",
                "CREATE TABLE IF NOT EXISTS agent_tools (
                    agent_id TEXT NOT NULL,
                    tool_id TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    PRIMARY KEY (agent_id, tool_id)
                )",
            ),
            (
                "agent_datasources",
                "CREATE TABLE IF NOT EXISTS agent_datasources (
                    agent_id TEXT NOT NULL,
                    datasource_id TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    PRIMARY KEY (agent_id, datasource_id)
                )",
            ),
            (
                "vector_databases",
                "CREATE TABLE IF NOT EXISTS vector_databases (
                    id TEXT PRIMARY KEY,
                    api_user_id TEXT NOT NULL,
                    provider TEXT NOT NULL,
                    options TEXT NOT NULL,
                    created_at INTEGER NOT NULL
                )",
            ),
        ];

        for (table, sql) in statements {
            conn.execute(sql, ())
                .await
                .map_err(|e| AppError::Gateway(format!("Failed to create {} table: {}", table, e)))?;
        }

        Ok(())
    }

    async fn query_one<T>(
        &self,
        sql: &str,
        params: Params,
        map: impl Fn(&Row) -> Result<T>,
    ) -> Result<Option<T>> {
        let conn = self.connection()?;

        let mut rows = conn
            .query(sql, params)
            .await
            .map_err(|e| AppError::Gateway(format!("Query failed: {}", e)))?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(map(&row)?)),
            None => Ok(None),
        }
    }

    async fn query_all<T>(
        &self,
        sql: &str,
        params: Params,
        map: impl Fn(&Row) -> Result<T>,
    ) -> Result<Vec<T>> {
        let conn = self.connection()?;

        let mut rows = conn
            .query(sql, params)
            .await
            .map_err(|e| AppError::Gateway(format!("Query failed: {}", e)))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            out.push(map(&row)?);
        }

        Ok(out)
    }

    /// Run `UPDATE <table> SET ... WHERE id = ?` for the bound fields.
    /// Returns the number of affected rows.
    async fn update_fields(
        &self,
        table: &str,
        id: &str,
        bound: Vec<(&'static str, SqlValue)>,
        touch_updated_at: bool,
    ) -> Result<u64> {
        let mut assignments: Vec<String> = bound.iter().map(|(c, _)| format!("{} = ?", c)).collect();
        let mut values: Vec<SqlValue> = bound.into_iter().map(|(_, v)| v).collect();

        if touch_updated_at {
            assignments.push("updated_at = ?".to_string());
            values.push(SqlValue::Integer(Utc::now().timestamp()));
        }

        if assignments.is_empty() {
            return Ok(0);
        }

        values.push(SqlValue::Text(id.to_string()));
        let sql = format!("UPDATE {} SET {} WHERE id = ?", table, assignments.join(", "));

        self.connection()?
            .execute(&sql, Params::Positional(values))
            .await
            .map_err(|e| AppError::Gateway(format!("Failed to update {}: {}", table, e)))
    }

    async fn get_agent(&self, id: &str) -> Result<Option<AgentRecord>> {
        self.query_one(
            &format!("{} WHERE id = ?", AGENT_SELECT),
            Params::Positional(vec![SqlValue::Text(id.to_string())]),
            agent_from_row,
        )
        .await
    }

    async fn get_tool(&self, id: &str) -> Result<Option<ToolRecord>> {
        self.query_one(
            &format!("{} WHERE id = ?", TOOL_SELECT),
            Params::Positional(vec![SqlValue::Text(id.to_string())]),
            tool_from_row,
        )
        .await
    }

    async fn get_datasource(&self, id: &str) -> Result<Option<DatasourceRecord>> {
        self.query_one(
            &format!("{} WHERE id = ?", DATASOURCE_SELECT),
            Params::Positional(vec![SqlValue::Text(id.to_string())]),
            datasource_from_row,
        )
        .await
    }

    /// Tools currently attached to an agent
    pub async fn agent_tools(&self, agent_id: &str) -> Result<Vec<ToolRecord>> {
        self.query_all(
            "SELECT t.id, t.name, t.description, t.tool_type, t.metadata, t.workflow_config_id,
                    t.agent_id, t.api_user_id, t.created_at, t.updated_at
             FROM tools t JOIN agent_tools at ON at.tool_id = t.id
             WHERE at.agent_id = ?
             ORDER BY t.created_at ASC, t.rowid ASC",
            Params::Positional(vec![SqlValue::Text(agent_id.to_string())]),
            tool_from_row,
        )
        .await
    }

    /// Datasources currently attached to an agent
    pub async fn agent_datasources(&self, agent_id: &str) -> Result<Vec<DatasourceRecord>> {
        self.query_all(
            "SELECT d.id, d.name, d.description, d.datasource_type, d.url, d.metadata,
                    d.vector_db_id, d.workflow_config_id, d.agent_id, d.api_user_id, d.created_at
             FROM datasources d JOIN agent_datasources ad ON ad.datasource_id = d.id
             WHERE ad.agent_id = ?
             ORDER BY d.created_at ASC, d.rowid ASC",
            Params::Positional(vec![SqlValue::Text(agent_id.to_string())]),
            datasource_from_row,
        )
        .await
    }

    /// All agents of a workflow config, in creation order
    pub async fn list_agents(&self, workflow_config_id: &str) -> Result<Vec<AgentRecord>> {
        self.query_all(
            &format!(
                "{} WHERE workflow_config_id = ? ORDER BY created_at ASC, rowid ASC",
                AGENT_SELECT
            ),
            Params::Positional(vec![SqlValue::Text(workflow_config_id.to_string())]),
            agent_from_row,
        )
        .await
    }
}

#[async_trait]
impl PersistenceGateway for TursoClient {
    async fn create_agent(&self, agent: &NewAgent) -> Result<AgentRecord> {
        require_text(&agent.fields, "name", "agent")?;
        require_text(&agent.fields, "type", "agent")?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp();
        let bound = bind_fields(&agent.fields, AGENT_COLUMNS, "agent")?;

        let mut columns = vec!["id", "workflow_config_id", "api_user_id", "created_at", "updated_at"];
        let mut values = vec![
            SqlValue::Text(id.clone()),
            SqlValue::Text(agent.workflow_config_id.clone()),
            SqlValue::Text(agent.api_user_id.clone()),
            SqlValue::Integer(now),
            SqlValue::Integer(now),
        ];
        for (column, value) in bound {
            columns.push(column);
            values.push(value);
        }

        let sql = format!(
            "INSERT INTO agents ({}) VALUES ({})",
            columns.join(", "),
            vec!["?"; columns.len()].join(", ")
        );

        self.connection()?
            .execute(&sql, Params::Positional(values))
            .await
            .map_err(|e| AppError::Gateway(format!("Failed to create agent: {}", e)))?;

        self.get_agent(&id)
            .await?
            .ok_or_else(|| AppError::Gateway(format!("Agent {} vanished after insert", id)))
    }

    async fn find_agent(&self, key: AgentKey<'_>) -> Result<Option<AgentRecord>> {
        self.query_one(
            &format!(
                "{} WHERE name = ? AND workflow_config_id = ? AND api_user_id = ?
                 ORDER BY created_at ASC, rowid ASC LIMIT 1",
                AGENT_SELECT
            ),
            Params::Positional(vec![
                SqlValue::Text(key.name.to_string()),
                SqlValue::Text(key.workflow_config_id.to_string()),
                SqlValue::Text(key.api_user_id.to_string()),
            ]),
            agent_from_row,
        )
        .await
    }

    async fn update_agent(&self, id: &str, changes: &FieldChanges) -> Result<AgentRecord> {
        let bound = bind_fields(changes, AGENT_COLUMNS, "agent")?;
        let affected = self.update_fields("agents", id, bound, true).await?;

        if affected == 0 {
            return Err(AppError::NotFound(format!("Agent {}", id)));
        }

        self.get_agent(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Agent {}", id)))
    }

    async fn delete_agent(&self, id: &str) -> Result<()> {
        let conn = self.connection()?;

        conn.execute("DELETE FROM agent_tools WHERE agent_id = ?", [id])
            .await
            .map_err(|e| AppError::Gateway(format!("Failed to detach agent tools: {}", e)))?;
        conn.execute("DELETE FROM agent_datasources WHERE agent_id = ?", [id])
            .await
            .map_err(|e| AppError::Gateway(format!("Failed to detach agent datasources: {}", e)))?;

        let affected = conn
            .execute("DELETE FROM agents WHERE id = ?", [id])
            .await
            .map_err(|e| AppError::Gateway(format!("Failed to delete agent: {}", e)))?;

        if affected == 0 {
            return Err(AppError::NotFound(format!("Agent {}", id)));
        }

        Ok(())
    }

    async fn create_tool(&self, tool: &NewTool) -> Result<ToolRecord> {
        require_text(&tool.fields, "name", "tool")?;
        require_text(&tool.fields, "type", "tool")?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp();
        let bound = bind_fields(&tool.fields, TOOL_COLUMNS, "tool")?;

        let mut columns = vec![
            "id",
            "workflow_config_id",
            "agent_id",
            "api_user_id",
            "created_at",
            "updated_at",
        ];
        let mut values = vec![
            SqlValue::Text(id.clone()),
            SqlValue::Text(tool.workflow_config_id.clone()),
            SqlValue::Text(tool.agent_id.clone()),
            SqlValue::Text(tool.api_user_id.clone()),
            SqlValue::Integer(now),
            SqlValue::Integer(now),
        ];
        for (column, value) in bound {
            columns.push(column);
            values.push(value);
        }

        let sql = format!(
            "INSERT INTO tools ({}) VALUES ({})",
            columns.join(", "),
            vec!["?"; columns.len()].join(", ")
        );

        self.connection()?
            .execute(&sql, Params::Positional(values))
            .await
            .map_err(|e| AppError::Gateway(format!("Failed to create tool: {}", e)))?;

        self.get_tool(&id)
            .await?
            .ok_or_else(|| AppError::Gateway(format!("Tool {} vanished after insert", id)))
    }

    async fn find_tool(&self, key: ChildKey<'_>) -> Result<Option<ToolRecord>> {
        self.query_one(
            &format!(
                "{} WHERE name = ? AND workflow_config_id = ? AND agent_id = ? AND api_user_id = ?
                 ORDER BY created_at ASC, rowid ASC LIMIT 1",
                TOOL_SELECT
            ),
            Params::Positional(vec![
                SqlValue::Text(key.name.to_string()),
                SqlValue::Text(key.workflow_config_id.to_string()),
                SqlValue::Text(key.agent_id.to_string()),
                SqlValue::Text(key.api_user_id.to_string()),
            ]),
            tool_from_row,
        )
        .await
    }

    async fn update_tool(&self, id: &str, changes: &FieldChanges) -> Result<ToolRecord> {
        let bound = bind_fields(changes, TOOL_COLUMNS, "tool")?;
        let affected = self.update_fields("tools", id, bound, true).await?;

        if affected == 0 {
            return Err(AppError::NotFound(format!("Tool {}", id)));
        }

        self.get_tool(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tool {}", id)))
    }

    async fn delete_tool(&self, id: &str) -> Result<()> {
        let conn = self.connection()?;

        conn.execute("DELETE FROM agent_tools WHERE tool_id = ?", [id])
            .await
            .map_err(|e| AppError::Gateway(format!("Failed to detach tool: {}", e)))?;

        let affected = conn
            .execute("DELETE FROM tools WHERE id = ?", [id])
            .await
            .map_err(|e| AppError::Gateway(format!("Failed to delete tool: {}", e)))?;

        if affected == 0 {
            return Err(AppError::NotFound(format!("Tool {}", id)));
        }

        Ok(())
    }

    async fn attach_tool(&self, agent_id: &str, tool_id: &str) -> Result<()> {
        let now = Utc::now().timestamp();

        self.connection()?
            .execute(
                "INSERT OR IGNORE INTO agent_tools (agent_id, tool_id, created_at) VALUES (?, ?, ?)",
                (agent_id, tool_id, now),
            )
            .await
            .map_err(|e| AppError::Gateway(format!("Failed to attach tool: {}", e)))?;

        Ok(())
    }

    async fn create_datasource(&self, datasource: &NewDatasource) -> Result<DatasourceRecord> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp();
        let metadata = match &datasource.metadata {
            Some(value) => to_sql_value(value, ColumnKind::Json)?,
            None => SqlValue::Null,
        };

        let values = vec![
            SqlValue::Text(id.clone()),
            SqlValue::Text(datasource.name.clone()),
            datasource
                .description
                .clone()
                .map(SqlValue::Text)
                .unwrap_or(SqlValue::Null),
            SqlValue::Text(datasource.datasource_type.clone()),
            SqlValue::Text(datasource.url.clone()),
            metadata,
            datasource
                .vector_db_id
                .clone()
                .map(SqlValue::Text)
                .unwrap_or(SqlValue::Null),
            SqlValue::Text(datasource.workflow_config_id.clone()),
            SqlValue::Text(datasource.agent_id.clone()),
            SqlValue::Text(datasource.api_user_id.clone()),
            SqlValue::Integer(now),
        ];

        self.connection()?
            .execute(
                "INSERT INTO datasources (id, name, description, datasource_type, url, metadata,
                    vector_db_id, workflow_config_id, agent_id, api_user_id, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                Params::Positional(values),
            )
            .await
            .map_err(|e| AppError::Gateway(format!("Failed to create datasource: {}", e)))?;

        self.get_datasource(&id)
            .await?
            .ok_or_else(|| AppError::Gateway(format!("Datasource {} vanished after insert", id)))
    }

    async fn find_datasource(&self, key: ChildKey<'_>) -> Result<Option<DatasourceRecord>> {
        self.query_one(
            &format!(
                "{} WHERE name = ? AND workflow_config_id = ? AND agent_id = ? AND api_user_id = ?
                 ORDER BY created_at ASC, rowid ASC LIMIT 1",
                DATASOURCE_SELECT
            ),
            Params::Positional(vec![
                SqlValue::Text(key.name.to_string()),
                SqlValue::Text(key.workflow_config_id.to_string()),
                SqlValue::Text(key.agent_id.to_string()),
                SqlValue::Text(key.api_user_id.to_string()),
            ]),
            datasource_from_row,
        )
        .await
    }

    async fn delete_datasource(&self, id: &str) -> Result<()> {
        let conn = self.connection()?;

        conn.execute("DELETE FROM agent_datasources WHERE datasource_id = ?", [id])
            .await
            .map_err(|e| AppError::Gateway(format!("Failed to detach datasource: {}", e)))?;

        let affected = conn
            .execute("DELETE FROM datasources WHERE id = ?", [id])
            .await
            .map_err(|e| AppError::Gateway(format!("Failed to delete datasource: {}", e)))?;

        if affected == 0 {
            return Err(AppError::NotFound(format!("Datasource {}", id)));
        }

        Ok(())
    }

    async fn attach_datasource(&self, agent_id: &str, datasource_id: &str) -> Result<()> {
        let now = Utc::now().timestamp();

        self.connection()?
            .execute(
                "INSERT OR IGNORE INTO agent_datasources (agent_id, datasource_id, created_at)
                 VALUES (?, ?, ?)",
                (agent_id, datasource_id, now),
            )
            .await
            .map_err(|e| AppError::Gateway(format!("Failed to attach datasource: {}", e)))?;

        Ok(())
    }

    async fn create_vector_database(
        &self,
        api_user_id: &str,
        provider: &str,
        options: &Map<String, Value>,
    ) -> Result<VectorDatabase> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp();
        let provider = provider.to_uppercase();
        let options_json = serde_json::to_string(options)
            .map_err(|e| AppError::Internal(format!("Failed to encode options: {}", e)))?;

        self.connection()?
            .execute(
                "INSERT INTO vector_databases (id, api_user_id, provider, options, created_at)
                 VALUES (?, ?, ?, ?, ?)",
                (id.as_str(), api_user_id, provider.as_str(), options_json.as_str(), now),
            )
            .await
            .map_err(|e| AppError::Gateway(format!("Failed to create vector database: {}", e)))?;

        Ok(VectorDatabase {
            id,
            api_user_id: api_user_id.to_string(),
            provider,
            options: options.clone(),
            created_at: now,
        })
    }

    async fn find_vector_database(
        &self,
        api_user_id: &str,
        provider: Option<&str>,
    ) -> Result<Option<VectorDatabase>> {
        let select = "SELECT id, api_user_id, provider, options, created_at FROM vector_databases";

        match provider {
            Some(provider) => {
                self.query_one(
                    &format!(
                        "{} WHERE api_user_id = ? AND provider = ?
                         ORDER BY created_at ASC, rowid ASC LIMIT 1",
                        select
                    ),
                    Params::Positional(vec![
                        SqlValue::Text(api_user_id.to_string()),
                        SqlValue::Text(provider.to_uppercase()),
                    ]),
                    vector_database_from_row,
                )
                .await
            }
            None => {
                self.query_one(
                    &format!(
                        "{} WHERE api_user_id = ? ORDER BY created_at ASC, rowid ASC LIMIT 1",
                        select
                    ),
                    Params::Positional(vec![SqlValue::Text(api_user_id.to_string())]),
                    vector_database_from_row,
                )
                .await
            }
        }
    }

    async fn create_workflow_config(
        &self,
        api_user_id: &str,
        description: Option<&str>,
    ) -> Result<WorkflowConfigRecord> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp();

        self.connection()?
            .execute(
                "INSERT INTO workflow_configs (id, api_user_id, description, latest_history_id,
                    created_at, updated_at)
                 VALUES (?, ?, ?, NULL, ?, ?)",
                Params::Positional(vec![
                    SqlValue::Text(id.clone()),
                    SqlValue::Text(api_user_id.to_string()),
                    description
                        .map(|d| SqlValue::Text(d.to_string()))
                        .unwrap_or(SqlValue::Null),
                    SqlValue::Integer(now),
                    SqlValue::Integer(now),
                ]),
            )
            .await
            .map_err(|e| AppError::Gateway(format!("Failed to create workflow config: {}", e)))?;

        Ok(WorkflowConfigRecord {
            id,
            api_user_id: api_user_id.to_string(),
            description: description.map(str::to_string),
            latest_history_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_workflow_config(&self, id: &str) -> Result<Option<WorkflowConfigRecord>> {
        self.query_one(
            "SELECT id, api_user_id, description, latest_history_id, created_at, updated_at
             FROM workflow_configs WHERE id = ?",
            Params::Positional(vec![SqlValue::Text(id.to_string())]),
            workflow_config_from_row,
        )
        .await
    }

    async fn set_latest_history(&self, workflow_config_id: &str, history_id: &str) -> Result<()> {
        let affected = self
            .update_fields(
                "workflow_configs",
                workflow_config_id,
                vec![("latest_history_id", SqlValue::Text(history_id.to_string()))],
                true,
            )
            .await?;

        if affected == 0 {
            return Err(AppError::NotFound(format!(
                "Workflow config {}",
                workflow_config_id
            )));
        }

        Ok(())
    }

    async fn create_history(
        &self,
        workflow_config_id: &str,
        config_file: &str,
    ) -> Result<ConfigHistory> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp();

        self.connection()?
            .execute(
                "INSERT INTO workflow_config_history (id, workflow_config_id, config_file, created_at)
                 VALUES (?, ?, ?, ?)",
                (id.as_str(), workflow_config_id, config_file, now),
            )
            .await
            .map_err(|e| AppError::Gateway(format!("Failed to create config history: {}", e)))?;

        Ok(ConfigHistory {
            id,
            workflow_config_id: workflow_config_id.to_string(),
            config_file: config_file.to_string(),
            created_at: now,
        })
    }

    async fn get_history(
        &self,
        workflow_config_id: &str,
        history_id: &str,
    ) -> Result<Option<ConfigHistory>> {
        self.query_one(
            "SELECT id, workflow_config_id, config_file, created_at
             FROM workflow_config_history WHERE workflow_config_id = ? AND id = ?",
            Params::Positional(vec![
                SqlValue::Text(workflow_config_id.to_string()),
                SqlValue::Text(history_id.to_string()),
            ]),
            history_from_row,
        )
        .await
    }

    async fn list_history(&self, workflow_config_id: &str) -> Result<Vec<ConfigHistory>> {
        self.query_all(
            "SELECT id, workflow_config_id, config_file, created_at
             FROM workflow_config_history WHERE workflow_config_id = ?
             ORDER BY created_at DESC, rowid DESC",
            Params::Positional(vec![SqlValue::Text(workflow_config_id.to_string())]),
            history_from_row,
        )
        .await
    }
}
