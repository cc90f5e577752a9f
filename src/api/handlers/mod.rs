//! API request handlers.
//!
//! This module contains all HTTP request handlers organized by functionality.

/// Liveness probe.
pub mod health;
/// Vector database registration handlers.
pub mod vector_databases;
/// Workflow config creation, reconciliation and history handlers.
pub mod workflow_configs;
