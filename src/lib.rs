//! # AgentForge - workflow configuration reconciliation server
//!
//! AgentForge is the backend of an agent builder: API users describe their
//! assistants, tools and datasources in a declarative YAML document, and the
//! server converges the persisted entities to match it.
//!
//! ## Overview
//!
//! AgentForge can be used in two ways:
//!
//! 1. **As a standalone server** - Run the `agentforge-server` binary
//! 2. **As a library** - Embed the reconciler in your own Rust project
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use agentforge::db::DatabaseProvider;
//! use agentforge::types::Caller;
//! use agentforge::workflows::{
//!     DataTransformer, HttpContentTypeSniffer, TransformMappings, WorkflowConfigService,
//! };
//! use std::{sync::Arc, time::Duration};
//!
//! let gateway = Arc::new(DatabaseProvider::Memory.create_client().await?);
//! let sniffer = Arc::new(HttpContentTypeSniffer::new(Duration::from_secs(10))?);
//! let transformer = DataTransformer::new(TransformMappings::default(), sniffer);
//! let service = WorkflowConfigService::new(gateway, transformer);
//!
//! let caller = Caller::new("api-user-1");
//! let config = service.create(&caller, None).await?;
//! let outcome = service.reconcile(&config.id, yaml, &caller).await?;
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `local-db` | Local SQLite database (default) |
//! | `turso` | Remote Turso database |
//! | `swagger-ui` | Interactive API documentation |
//!
//! ## Modules
//!
//! - [`api`] - REST API handlers and routes
//! - [`auth`] - JWT authentication and middleware
//! - [`cli`] - Command-line interface
//! - [`db`] - Persistence gateway (SQLite, Turso)
//! - [`workflows`] - Parsing, diffing and reconciliation of workflow configs
//! - [`types`] - Common types and error handling
//! - [`utils`] - TOML configuration with hot reload

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// HTTP API handlers and routes.
pub mod api;
/// JWT authentication and middleware.
pub mod auth;
/// Command-line interface.
pub mod cli;
/// Persistence gateway and its Turso/SQLite implementation.
pub mod db;
/// Core types (requests, responses, errors).
pub mod types;
/// Configuration utilities.
pub mod utils;
/// Workflow configuration parsing, diffing and reconciliation.
pub mod workflows;

// Re-export commonly used types
pub use db::{PersistenceGateway, TursoClient};
pub use types::{AppError, Result};
pub use utils::toml_config::{ForgeConfig, ForgeConfigManager};
pub use workflows::{ReconcileOutcome, ReconcileReport, WorkflowConfig, WorkflowConfigService};

use crate::auth::jwt::AuthService;
use crate::workflows::{ContentTypeSniffer, DataTransformer, TransformMappings};
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// TOML-based configuration with hot-reload support
    pub config_manager: Arc<ForgeConfigManager>,
    /// Persistence gateway
    pub gateway: Arc<dyn PersistenceGateway>,
    /// Content-type sniffer for datasource URLs
    pub sniffer: Arc<dyn ContentTypeSniffer>,
    /// Authentication service
    pub auth_service: Arc<AuthService>,
}

impl AppState {
    /// Reconciliation service using the current lookup tables
    pub fn workflow_service(&self) -> WorkflowConfigService {
        let config = self.config_manager.config();
        let transformer = DataTransformer::new(
            TransformMappings::from_config(&config),
            Arc::clone(&self.sniffer),
        );

        WorkflowConfigService::new(Arc::clone(&self.gateway), transformer)
    }
}
