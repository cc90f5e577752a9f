//! HTTP API Handlers and Routes
//!
//! This module provides the REST API layer for AgentForge, built on the Axum web framework.
//!
//! # Module Structure
//!
//! - [`api::handlers`](crate::api::handlers) - Request handlers for each endpoint
//! - [`api::routes`](crate::api::routes) - Route definitions and router configuration
//!
//! # API Endpoints
//!
//! ## Workflow configs (`/api/workflow-configs`)
//! - `POST /api/workflow-configs` - Create an empty workflow config
//! - `GET /api/workflow-configs/{id}` - Get a workflow config and its last applied configuration
//! - `POST /api/workflow-configs/{id}` - Apply a YAML configuration (body: `application/x-yaml`)
//! - `GET /api/workflow-configs/{id}/history` - Applied configurations, newest first
//!
//! ## Vector databases (`/api/vector-databases`)
//! - `POST /api/vector-databases` - Register a vector database for datasources
//!
//! ## Health (`/api/health`)
//! - `GET /api/health` - Health check endpoint
//!
//! # Authentication
//!
//! All endpoints but the health check require a valid JWT token in the
//! `Authorization` header:
//! ```text
//! Authorization: Bearer <token>
//! ```
//!
//! # OpenAPI Documentation
//!
//! When the `swagger-ui` feature is enabled, interactive API documentation
//! is available at `/swagger-ui/`.

/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;

use utoipa::OpenApi;

/// OpenAPI description of the HTTP surface
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::workflow_configs::create_workflow_config,
        handlers::workflow_configs::get_workflow_config,
        handlers::workflow_configs::reconcile_workflow_config,
        handlers::workflow_configs::list_history,
        handlers::vector_databases::register_vector_database,
    ),
    components(schemas(
        crate::types::CreateWorkflowConfigRequest,
        crate::types::WorkflowConfigResponse,
        crate::types::HistoryEntryResponse,
        crate::types::ReconcileResponse,
        crate::types::RegisterVectorDatabaseRequest,
        crate::types::VectorDatabaseResponse,
    )),
    tags(
        (name = "workflow-configs", description = "Declarative workflow configurations"),
        (name = "vector-databases", description = "Vector databases for datasources"),
        (name = "health", description = "Liveness")
    )
)]
pub struct ApiDoc;
