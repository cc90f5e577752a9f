//! Applies the diff between two workflow configurations to the persistence
//! gateway.
//!
//! Calls are issued one at a time. Every target is located by its composite
//! name key right before it is mutated. The first failure aborts the run and
//! leaves the already-applied steps in place. A rerun picks up records such a
//! run left behind: a create whose key is already persisted, and not claimed by
//! the baseline, becomes an update of that record.

use crate::db::{AgentKey, AgentRecord, ChildKey, NewAgent, NewTool, PersistenceGateway};
use crate::types::{AppError, Result};
use crate::workflows::diff::{diff_entries, diff_urls, EntryChange};
use crate::workflows::schema::{
    AssistantEntry, AssistantSpec, DatasourceSpec, ToolEntry, ToolSpec, WorkflowConfig,
};
use crate::workflows::transform::DataTransformer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Optional columns a reused record must not keep from its earlier write
const AGENT_OPTIONAL_FIELDS: &[&str] = &["initialMessage", "llmProvider", "llmModel", "metadata"];
const TOOL_OPTIONAL_FIELDS: &[&str] = &["description", "metadata"];

fn overwrite_all(mut fields: Map<String, Value>, optional: &[&str]) -> Map<String, Value> {
    for key in optional {
        fields.entry(*key).or_insert(Value::Null);
    }
    fields
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCounts {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

/// What a reconciliation run changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub agents: EntityCounts,
    pub tools: EntityCounts,
    pub datasources: EntityCounts,
    /// Datasource URLs dropped because their content type is not supported
    pub skipped_urls: Vec<String>,
}

impl ReconcileReport {
    /// Number of create/update/delete calls issued
    pub fn mutations(&self) -> usize {
        [self.agents, self.tools, self.datasources]
            .iter()
            .map(|c| c.created + c.updated + c.deleted)
            .sum()
    }
}

/// The owner every reconciled entity belongs to
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub workflow_config_id: &'a str,
    pub api_user_id: &'a str,
}

pub struct Reconciler<'a> {
    gateway: &'a dyn PersistenceGateway,
    transformer: &'a DataTransformer,
    scope: Scope<'a>,
    /// Agent names the old configuration accounts for
    baseline_agents: HashSet<String>,
    report: ReconcileReport,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        gateway: &'a dyn PersistenceGateway,
        transformer: &'a DataTransformer,
        scope: Scope<'a>,
    ) -> Self {
        Self {
            gateway,
            transformer,
            scope,
            baseline_agents: HashSet::new(),
            report: ReconcileReport::default(),
        }
    }

    /// Converge persisted state from `old` to `new`
    pub async fn apply(
        mut self,
        old: &WorkflowConfig,
        new: &WorkflowConfig,
    ) -> Result<ReconcileReport> {
        self.baseline_agents = old
            .workflows
            .iter()
            .map(|entry| entry.spec.name.clone())
            .collect();

        let transformer = self.transformer;
        let changes = diff_entries(&old.workflows, &new.workflows, |entry| {
            transformer.transform_assistant(&entry.spec, &entry.tag)
        });

        for change in changes {
            self.apply_assistant(change).await?;
        }

        Ok(self.report)
    }

    async fn apply_assistant(
        &mut self,
        change: EntryChange<'_, AssistantSpec>,
    ) -> Result<()> {
        debug!(kind = change.kind(), "Assistant diff");

        match change {
            EntryChange::Unchanged { old, new } => {
                self.sync_children(&old.spec.name, Some(old), Some(new)).await?;
            }
            EntryChange::Update { old, new, changes } => {
                self.sync_children(&old.spec.name, Some(old), Some(new)).await?;
                self.update_agent(&old.spec.name, &changes).await?;
            }
            EntryChange::Replace { old, new } => {
                self.sync_children(&old.spec.name, Some(old), None).await?;
                self.delete_agent(&old.spec.name).await?;
                self.create_agent(new).await?;
                self.sync_children(&new.spec.name, None, Some(new)).await?;
            }
            EntryChange::Delete { old } => {
                self.sync_children(&old.spec.name, Some(old), None).await?;
                self.delete_agent(&old.spec.name).await?;
            }
            EntryChange::Create { new } => {
                self.create_agent(new).await?;
                self.sync_children(&new.spec.name, None, Some(new)).await?;
            }
        }

        Ok(())
    }

    /// Tools first, then datasources, all against `agent_name`
    async fn sync_children(
        &mut self,
        agent_name: &str,
        old: Option<&AssistantEntry>,
        new: Option<&AssistantEntry>,
    ) -> Result<()> {
        let old_tools = old.map(|e| e.spec.tools()).unwrap_or_default();
        let new_tools = new.map(|e| e.spec.tools()).unwrap_or_default();
        let baseline_tools: HashSet<&str> =
            old_tools.iter().map(|e| e.spec.name.as_str()).collect();

        let tool_changes = diff_entries(old_tools, new_tools, |entry| {
            DataTransformer::transform_tool(&entry.spec, &entry.tag)
        });
        for change in tool_changes {
            self.apply_tool(agent_name, &baseline_tools, change).await?;
        }

        let old_urls = old.map(|e| e.spec.urls()).unwrap_or_default();
        let new_urls = new.map(|e| e.spec.urls()).unwrap_or_default();
        let url_diff = diff_urls(old_urls, new_urls);

        for url in &url_diff.removed {
            self.delete_datasource(agent_name, url).await?;
        }

        if !url_diff.added.is_empty() {
            let spec = new
                .and_then(|e| e.spec.data.as_ref())
                .cloned()
                .unwrap_or_default();
            self.create_datasources(agent_name, &spec, &url_diff.added)
                .await?;
        }

        Ok(())
    }

    async fn apply_tool(
        &mut self,
        agent_name: &str,
        baseline_tools: &HashSet<&str>,
        change: EntryChange<'_, ToolSpec>,
    ) -> Result<()> {
        debug!(agent = agent_name, kind = change.kind(), "Tool diff");

        match change {
            EntryChange::Unchanged { .. } => {}
            EntryChange::Update { old, changes, .. } => {
                self.update_tool(agent_name, &old.spec.name, &changes).await?;
            }
            EntryChange::Replace { old, new } => {
                self.delete_tool(agent_name, &old.spec.name).await?;
                self.create_tool(agent_name, new, baseline_tools).await?;
            }
            EntryChange::Delete { old } => {
                self.delete_tool(agent_name, &old.spec.name).await?;
            }
            EntryChange::Create { new } => {
                self.create_tool(agent_name, new, baseline_tools).await?;
            }
        }

        Ok(())
    }

    // ============== Lookups ==============

    fn agent_key<'k>(&'k self, name: &'k str) -> AgentKey<'k> {
        AgentKey {
            name,
            workflow_config_id: self.scope.workflow_config_id,
            api_user_id: self.scope.api_user_id,
        }
    }

    async fn agent_id(&self, name: &str) -> Result<String> {
        self.gateway
            .find_agent(self.agent_key(name))
            .await?
            .map(|agent| agent.id)
            .ok_or_else(|| AppError::NotFound(format!("Agent '{}'", name)))
    }

    fn child_key<'k>(&'k self, name: &'k str, agent_id: &'k str) -> ChildKey<'k> {
        ChildKey {
            name,
            workflow_config_id: self.scope.workflow_config_id,
            agent_id,
            api_user_id: self.scope.api_user_id,
        }
    }

    // ============== Agents ==============

    /// An agent persisted under `name` that the old configuration does not claim
    async fn leftover_agent(&self, name: &str) -> Result<Option<AgentRecord>> {
        if self.baseline_agents.contains(name) {
            return Ok(None);
        }
        self.gateway.find_agent(self.agent_key(name)).await
    }

    async fn create_agent(&mut self, entry: &AssistantEntry) -> Result<()> {
        let fields = self.transformer.transform_assistant(&entry.spec, &entry.tag);

        if let Some(existing) = self.leftover_agent(&entry.spec.name).await? {
            let fields = overwrite_all(fields, AGENT_OPTIONAL_FIELDS);
            self.gateway.update_agent(&existing.id, &fields).await?;
            self.report.agents.updated += 1;
            info!(agent = %existing.name, agent_id = %existing.id, "Reused agent from an interrupted run");
            return Ok(());
        }

        let agent = self
            .gateway
            .create_agent(&NewAgent {
                workflow_config_id: self.scope.workflow_config_id.to_string(),
                api_user_id: self.scope.api_user_id.to_string(),
                fields,
            })
            .await?;

        self.report.agents.created += 1;
        info!(agent = %agent.name, agent_id = %agent.id, "Created agent");
        Ok(())
    }

    async fn update_agent(&mut self, name: &str, changes: &Map<String, Value>) -> Result<()> {
        let id = self.agent_id(name).await?;
        self.gateway.update_agent(&id, changes).await?;

        self.report.agents.updated += 1;
        info!(agent = name, fields = ?changes.keys().collect::<Vec<_>>(), "Updated agent");
        Ok(())
    }

    async fn delete_agent(&mut self, name: &str) -> Result<()> {
        let id = self.agent_id(name).await?;
        self.gateway.delete_agent(&id).await?;

        self.report.agents.deleted += 1;
        info!(agent = name, "Deleted agent");
        Ok(())
    }

    // ============== Tools ==============

    async fn create_tool(
        &mut self,
        agent_name: &str,
        entry: &ToolEntry,
        baseline_tools: &HashSet<&str>,
    ) -> Result<()> {
        let agent_id = self.agent_id(agent_name).await?;
        let fields = DataTransformer::transform_tool(&entry.spec, &entry.tag);

        let leftover = if baseline_tools.contains(entry.spec.name.as_str()) {
            None
        } else {
            self.gateway
                .find_tool(self.child_key(&entry.spec.name, &agent_id))
                .await?
        };

        let tool = match leftover {
            Some(existing) => {
                let fields = overwrite_all(fields, TOOL_OPTIONAL_FIELDS);
                let tool = self.gateway.update_tool(&existing.id, &fields).await?;
                self.report.tools.updated += 1;
                info!(agent = agent_name, tool = %tool.name, "Reused tool from an interrupted run");
                tool
            }
            None => {
                let tool = self
                    .gateway
                    .create_tool(&NewTool {
                        workflow_config_id: self.scope.workflow_config_id.to_string(),
                        agent_id: agent_id.clone(),
                        api_user_id: self.scope.api_user_id.to_string(),
                        fields,
                    })
                    .await?;
                self.report.tools.created += 1;
                info!(agent = agent_name, tool = %tool.name, "Created tool");
                tool
            }
        };

        self.gateway.attach_tool(&agent_id, &tool.id).await?;
        info!(agent = agent_name, tool = %tool.name, "Attached tool");
        Ok(())
    }

    async fn update_tool(
        &mut self,
        agent_name: &str,
        tool_name: &str,
        changes: &Map<String, Value>,
    ) -> Result<()> {
        let agent_id = self.agent_id(agent_name).await?;
        let tool = self
            .gateway
            .find_tool(self.child_key(tool_name, &agent_id))
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Tool '{}' of agent '{}'", tool_name, agent_name))
            })?;

        self.gateway.update_tool(&tool.id, changes).await?;

        self.report.tools.updated += 1;
        info!(agent = agent_name, tool = tool_name, "Updated tool");
        Ok(())
    }

    async fn delete_tool(&mut self, agent_name: &str, tool_name: &str) -> Result<()> {
        let agent_id = self.agent_id(agent_name).await?;
        let tool = self
            .gateway
            .find_tool(self.child_key(tool_name, &agent_id))
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Tool '{}' of agent '{}'", tool_name, agent_name))
            })?;

        self.gateway.delete_tool(&tool.id).await?;

        self.report.tools.deleted += 1;
        info!(agent = agent_name, tool = tool_name, "Deleted tool");
        Ok(())
    }

    // ============== Datasources ==============

    async fn create_datasources(
        &mut self,
        agent_name: &str,
        spec: &DatasourceSpec,
        urls: &[String],
    ) -> Result<()> {
        let transformed = self
            .transformer
            .transform_datasource(self.gateway, self.scope.api_user_id, spec, urls)
            .await?;
        self.report
            .skipped_urls
            .extend(transformed.skipped.iter().cloned());

        for file in &transformed.files {
            let agent_id = self.agent_id(agent_name).await?;

            // Added URLs are never in the baseline, so any record here is a leftover
            if let Some(existing) = self
                .gateway
                .find_datasource(self.child_key(&file.url, &agent_id))
                .await?
            {
                self.gateway
                    .attach_datasource(&agent_id, &existing.id)
                    .await?;
                info!(agent = agent_name, url = %file.url, "Reused datasource from an interrupted run");
                continue;
            }

            let record = transformed.new_datasource(
                file,
                self.scope.workflow_config_id,
                &agent_id,
                self.scope.api_user_id,
            );

            let datasource = self.gateway.create_datasource(&record).await?;
            self.report.datasources.created += 1;
            info!(agent = agent_name, url = %file.url, file_type = %file.file_type, "Created datasource");

            self.gateway
                .attach_datasource(&agent_id, &datasource.id)
                .await?;
            info!(agent = agent_name, url = %file.url, "Attached datasource");
        }

        Ok(())
    }

    async fn delete_datasource(&mut self, agent_name: &str, url: &str) -> Result<()> {
        let agent_id = self.agent_id(agent_name).await?;
        let datasource = self
            .gateway
            .find_datasource(self.child_key(url, &agent_id))
            .await?;

        // URLs skipped at creation time never got a record
        let Some(datasource) = datasource else {
            warn!(agent = agent_name, url, "No datasource recorded for URL, nothing to delete");
            return Ok(());
        };

        self.gateway.delete_datasource(&datasource.id).await?;

        self.report.datasources.deleted += 1;
        info!(agent = agent_name, url, "Deleted datasource");
        Ok(())
    }
}
