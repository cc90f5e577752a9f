//! Workflow config handlers
//!
//! A workflow config is created empty; posting a YAML document to it
//! reconciles the caller's persisted agents against that document and
//! appends it to the config's history.

use crate::{
    auth::middleware::AuthUser,
    db::ConfigHistory,
    types::{
        AppError, CreateWorkflowConfigRequest, HistoryEntryResponse, ReconcileResponse, Result,
        WorkflowConfigResponse,
    },
    AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

fn history_entry(history: ConfigHistory) -> Result<HistoryEntryResponse> {
    let config = serde_json::from_str(&history.config_file).map_err(|e| {
        AppError::Internal(format!("Corrupt history entry {}: {}", history.id, e))
    })?;

    Ok(HistoryEntryResponse {
        id: history.id,
        workflow_config_id: history.workflow_config_id,
        config,
        created_at: history.created_at,
    })
}

/// Create an empty workflow config owned by the caller
#[utoipa::path(
    post,
    path = "/api/workflow-configs",
    request_body = CreateWorkflowConfigRequest,
    responses(
        (status = 201, description = "Workflow config created", body = WorkflowConfigResponse),
        (status = 401, description = "Unauthorized")
    ),
    tag = "workflow-configs",
    security(("bearer" = []))
)]
pub async fn create_workflow_config(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateWorkflowConfigRequest>,
) -> Result<(StatusCode, Json<WorkflowConfigResponse>)> {
    let record = state
        .workflow_service()
        .create(&user.caller(), payload.description.as_deref())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(WorkflowConfigResponse {
            id: record.id,
            description: record.description,
            latest_history_id: None,
            latest_config: None,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }),
    ))
}

/// Get a workflow config with its last applied configuration
#[utoipa::path(
    get,
    path = "/api/workflow-configs/{id}",
    responses(
        (status = 200, description = "Workflow config", body = WorkflowConfigResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Workflow config not found")
    ),
    params(
        ("id" = String, Path, description = "Workflow config id")
    ),
    tag = "workflow-configs",
    security(("bearer" = []))
)]
pub async fn get_workflow_config(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<WorkflowConfigResponse>> {
    let service = state.workflow_service();
    let record = service.load(&id, &user.caller()).await?;

    let latest_config = service
        .latest_config(&record)
        .await?
        .map(serde_json::to_value)
        .transpose()
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(WorkflowConfigResponse {
        id: record.id,
        description: record.description,
        latest_history_id: record.latest_history_id,
        latest_config,
        created_at: record.created_at,
        updated_at: record.updated_at,
    }))
}

/// Apply a YAML workflow configuration
///
/// The body is the raw YAML document. On failure, operations that were
/// already applied stay in place and no history entry is written.
#[utoipa::path(
    post,
    path = "/api/workflow-configs/{id}",
    request_body(content = String, content_type = "application/x-yaml"),
    responses(
        (status = 200, description = "Configuration applied", body = ReconcileResponse),
        (status = 400, description = "Malformed YAML, invalid configuration or no vector database"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Workflow config or a referenced entity not found")
    ),
    params(
        ("id" = String, Path, description = "Workflow config id")
    ),
    tag = "workflow-configs",
    security(("bearer" = []))
)]
pub async fn reconcile_workflow_config(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    body: String,
) -> Result<Json<ReconcileResponse>> {
    let outcome = state
        .workflow_service()
        .reconcile(&id, &body, &user.caller())
        .await?;

    Ok(Json(ReconcileResponse {
        success: outcome.success,
        history_id: outcome.history_id,
        report: outcome.report,
    }))
}

/// List the applied configurations of a workflow config, newest first
#[utoipa::path(
    get,
    path = "/api/workflow-configs/{id}/history",
    responses(
        (status = 200, description = "History entries", body = Vec<HistoryEntryResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Workflow config not found")
    ),
    params(
        ("id" = String, Path, description = "Workflow config id")
    ),
    tag = "workflow-configs",
    security(("bearer" = []))
)]
pub async fn list_history(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<HistoryEntryResponse>>> {
    let entries = state
        .workflow_service()
        .history(&id, &user.caller())
        .await?
        .into_iter()
        .map(history_entry)
        .collect::<Result<Vec<_>>>()?;

    Ok(Json(entries))
}
