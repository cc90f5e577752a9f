//! Reconciliation entry point and history bookkeeping

use crate::db::{ConfigHistory, PersistenceGateway, WorkflowConfigRecord};
use crate::types::{AppError, Caller, Result};
use crate::workflows::reconciler::{ReconcileReport, Reconciler, Scope};
use crate::workflows::schema::{self, WorkflowConfig};
use crate::workflows::transform::DataTransformer;
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub success: bool,
    pub history_id: String,
    pub report: ReconcileReport,
}

pub struct WorkflowConfigService {
    gateway: Arc<dyn PersistenceGateway>,
    transformer: DataTransformer,
}

impl WorkflowConfigService {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, transformer: DataTransformer) -> Self {
        Self {
            gateway,
            transformer,
        }
    }

    pub async fn create(
        &self,
        caller: &Caller,
        description: Option<&str>,
    ) -> Result<WorkflowConfigRecord> {
        let record = self
            .gateway
            .create_workflow_config(&caller.api_user_id, description)
            .await?;

        info!(workflow_config_id = %record.id, "Created workflow config");
        Ok(record)
    }

    /// Load a workflow config owned by the caller.
    ///
    /// Configs owned by someone else are reported as missing.
    pub async fn load(&self, workflow_config_id: &str, caller: &Caller) -> Result<WorkflowConfigRecord> {
        self.gateway
            .get_workflow_config(workflow_config_id)
            .await?
            .filter(|record| record.api_user_id == caller.api_user_id)
            .ok_or_else(|| AppError::NotFound(format!("Workflow config {}", workflow_config_id)))
    }

    /// The configuration applied by the last successful reconciliation
    pub async fn latest_config(
        &self,
        record: &WorkflowConfigRecord,
    ) -> Result<Option<WorkflowConfig>> {
        let Some(history_id) = record.latest_history_id.as_deref() else {
            return Ok(None);
        };

        match self.gateway.get_history(&record.id, history_id).await? {
            Some(history) => WorkflowConfig::from_json(&history.config_file).map(Some),
            None => {
                warn!(
                    workflow_config_id = %record.id,
                    history_id,
                    "Latest history row is missing, treating baseline as empty"
                );
                Ok(None)
            }
        }
    }

    /// History of a caller's workflow config, newest first
    pub async fn history(
        &self,
        workflow_config_id: &str,
        caller: &Caller,
    ) -> Result<Vec<ConfigHistory>> {
        let record = self.load(workflow_config_id, caller).await?;
        self.gateway.list_history(&record.id).await
    }

    /// Converge the persisted agents of a workflow config to `raw_config`.
    ///
    /// The text is parsed before anything else, so malformed input never
    /// reaches the gateway. On failure the steps already applied stay
    /// committed and no history row is written.
    #[instrument(skip(self, raw_config, caller), fields(api_user_id = %caller.api_user_id))]
    pub async fn reconcile(
        &self,
        workflow_config_id: &str,
        raw_config: &str,
        caller: &Caller,
    ) -> Result<ReconcileOutcome> {
        let new_config = schema::parse(raw_config)?;

        let record = self.load(workflow_config_id, caller).await?;
        let old_config = self.latest_config(&record).await?.unwrap_or_default();

        let scope = Scope {
            workflow_config_id: &record.id,
            api_user_id: &caller.api_user_id,
        };
        let report = Reconciler::new(self.gateway.as_ref(), &self.transformer, scope)
            .apply(&old_config, &new_config)
            .await?;

        let history = self
            .gateway
            .create_history(&record.id, &new_config.to_json()?)
            .await?;
        self.gateway
            .set_latest_history(&record.id, &history.id)
            .await?;

        info!(
            history_id = %history.id,
            mutations = report.mutations(),
            skipped_urls = report.skipped_urls.len(),
            "Reconciled workflow config"
        );

        Ok(ReconcileOutcome {
            success: true,
            history_id: history.id,
            report,
        })
    }
}
