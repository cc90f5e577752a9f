//! Configuration utilities

/// TOML configuration (`agentforge.toml`) with hot reload.
pub mod toml_config;
