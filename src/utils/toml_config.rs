//! TOML-based configuration for AgentForge
//!
//! This module provides declarative configuration for the server, the
//! persistence backend and the lookup tables used when normalizing workflow
//! configurations (`agentforge.toml`).
//!
//! # Hot Reloading
//!
//! Configuration changes are automatically detected and applied at runtime.
//! Use `ForgeConfigManager` for thread-safe access to the current configuration.

use arc_swap::ArcSwap;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Root configuration structure loaded from agentforge.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgeConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub sniffer: SnifferConfig,

    /// Declarative model identifier → persistence provider/model
    #[serde(default = "default_llm_models")]
    pub llm_models: HashMap<String, LlmModelConfig>,

    /// MIME type → datasource file-type tag
    #[serde(default = "default_mime_types")]
    pub mime_types: HashMap<String, String>,

    #[serde(default)]
    pub datasources: DatasourcesConfig,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            database: DatabaseConfig::default(),
            sniffer: SnifferConfig::default(),
            llm_models: default_llm_models(),
            mime_types: default_mime_types(),
            datasources: DatasourcesConfig::default(),
        }
    }
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

// ============= Authentication Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Environment variable name containing the JWT secret
    #[serde(default = "default_jwt_secret_env")]
    pub jwt_secret_env: String,

    /// Token lifetime in seconds
    #[serde(default = "default_jwt_expiry")]
    pub jwt_expiry: i64,
}

fn default_jwt_secret_env() -> String {
    "JWT_SECRET".to_string()
}

fn default_jwt_expiry() -> i64 {
    3600
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret_env: default_jwt_secret_env(),
            jwt_expiry: default_jwt_expiry(),
        }
    }
}

// ============= Database Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Local database URL/path (`:memory:` for an ephemeral database)
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Environment variable for Turso URL (optional cloud config)
    pub turso_url_env: Option<String>,

    /// Environment variable for Turso auth token
    pub turso_token_env: Option<String>,
}

fn default_database_url() -> String {
    "./data/agentforge.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            turso_url_env: None,
            turso_token_env: None,
        }
    }
}

// ============= Content Sniffing Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnifferConfig {
    /// Timeout for the HEAD request issued per datasource URL
    #[serde(default = "default_sniffer_timeout")]
    pub timeout_secs: u64,
}

fn default_sniffer_timeout() -> u64 {
    10
}

impl Default for SnifferConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_sniffer_timeout(),
        }
    }
}

// ============= Lookup Tables =============

/// Where a declarative model identifier lands in the persistence schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmModelConfig {
    /// Provider tag, e.g. `OPENAI`
    pub provider: String,
    /// Persistence model id, e.g. `GPT_4_1106_PREVIEW`
    pub model: String,
}

fn llm(provider: &str, model: &str) -> LlmModelConfig {
    LlmModelConfig {
        provider: provider.to_string(),
        model: model.to_string(),
    }
}

fn default_llm_models() -> HashMap<String, LlmModelConfig> {
    HashMap::from([
        ("gpt-3.5-turbo-16k-0613".to_string(), llm("OPENAI", "GPT_3_5_TURBO_16K_0613")),
        ("gpt-3.5-turbo-0613".to_string(), llm("OPENAI", "GPT_3_5_TURBO_0613")),
        ("gpt-3.5-turbo-1106".to_string(), llm("OPENAI", "GPT_3_5_TURBO_1106")),
        ("gpt-4-0613".to_string(), llm("OPENAI", "GPT_4_0613")),
        ("gpt-4-1106-preview".to_string(), llm("OPENAI", "GPT_4_1106_PREVIEW")),
        (
            "mistral-7b-instruct-v0.1".to_string(),
            llm("HUGGINGFACE", "MISTRAL_7B_INSTRUCT_V01"),
        ),
    ])
}

fn default_mime_types() -> HashMap<String, String> {
    [
        ("application/pdf", "PDF"),
        (
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            "DOCX",
        ),
        (
            "application/vnd.openxmlformats-officedocument.presentationml.presentation",
            "PPTX",
        ),
        ("application/vnd.google-apps.document", "GOOGLE_DOC"),
        ("text/markdown", "MARKDOWN"),
        ("text/html", "WEBPAGE"),
        ("text/plain", "TXT"),
    ]
    .into_iter()
    .map(|(mime, tag)| (mime.to_string(), tag.to_string()))
    .collect()
}

// ============= Datasource Configuration =============

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasourcesConfig {
    #[serde(default)]
    pub default_encoder: EncoderConfig,
}

/// Embedding encoder used when a datasource does not name one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderConfig {
    #[serde(rename = "type", default = "default_encoder_type")]
    pub encoder_type: String,

    #[serde(default = "default_encoder_name")]
    pub name: String,

    #[serde(default = "default_encoder_dimensions")]
    pub dimensions: u32,
}

fn default_encoder_type() -> String {
    "openai".to_string()
}

fn default_encoder_name() -> String {
    "text-embedding-3-small".to_string()
}

fn default_encoder_dimensions() -> u32 {
    1536
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            encoder_type: default_encoder_type(),
            name: default_encoder_name(),
            dimensions: default_encoder_dimensions(),
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),

    #[error("Watch error: {0}")]
    WatchError(#[from] notify::Error),
}

impl ForgeConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: ForgeConfig = toml::from_str(&content)?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "server.port must be non-zero".to_string(),
            ));
        }

        if self.auth.jwt_expiry <= 0 {
            return Err(ConfigError::ValidationError(
                "auth.jwt_expiry must be positive".to_string(),
            ));
        }

        if self.sniffer.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "sniffer.timeout_secs must be non-zero".to_string(),
            ));
        }

        for (id, model) in &self.llm_models {
            if model.provider.trim().is_empty() || model.model.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "llm_models.\"{}\" needs both a provider and a model",
                    id
                )));
            }
        }

        for (mime, tag) in &self.mime_types {
            if tag.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "mime_types.\"{}\" maps to an empty file type",
                    mime
                )));
            }
        }

        let encoder = &self.datasources.default_encoder;
        if encoder.dimensions == 0 || encoder.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "datasources.default_encoder needs a name and non-zero dimensions".to_string(),
            ));
        }

        Ok(())
    }

    /// Get a resolved value from an env var reference
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok()
    }

    /// Get the JWT secret from the environment
    pub fn jwt_secret(&self) -> Result<String, ConfigError> {
        self.resolve_env(&self.auth.jwt_secret_env)
            .ok_or_else(|| ConfigError::MissingEnvVar(self.auth.jwt_secret_env.clone()))
    }

    /// Remote Turso credentials, when both env vars are configured and set
    pub fn turso_credentials(&self) -> Option<(String, String)> {
        let url = self.resolve_env(self.database.turso_url_env.as_deref()?)?;
        let token = self.resolve_env(self.database.turso_token_env.as_deref()?)?;
        Some((url, token))
    }
}

// ============= Hot Reloading Configuration Manager =============

/// Thread-safe configuration manager with hot reloading support
pub struct ForgeConfigManager {
    config: Arc<ArcSwap<ForgeConfig>>,
    config_path: PathBuf,
    watcher: RwLock<Option<RecommendedWatcher>>,
    reload_tx: Option<mpsc::UnboundedSender<()>>,
}

impl ForgeConfigManager {
    /// Create a new configuration manager and load the initial config
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        // Absolute path for reliable file watching
        let path = path.as_ref();
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(ConfigError::ReadError)?
                .join(path)
        };

        let config = ForgeConfig::load(&path)?;

        Ok(Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: path,
            watcher: RwLock::new(None),
            reload_tx: None,
        })
    }

    /// Create a config manager directly from a config.
    /// This won't have file watching capabilities.
    pub fn from_config(config: ForgeConfig) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: PathBuf::from("agentforge.toml"),
            watcher: RwLock::new(None),
            reload_tx: None,
        }
    }

    /// Get the current configuration (lockless read)
    pub fn config(&self) -> Arc<ForgeConfig> {
        self.config.load_full()
    }

    /// Manually reload the configuration from disk
    pub fn reload(&self) -> Result<(), ConfigError> {
        info!("Reloading configuration from {:?}", self.config_path);

        let new_config = ForgeConfig::load(&self.config_path)?;
        self.config.store(Arc::new(new_config));

        info!("Configuration reloaded successfully");
        Ok(())
    }

    /// Start watching for configuration file changes
    pub fn start_watching(&mut self) -> Result<(), ConfigError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        self.reload_tx = Some(tx.clone());

        let config_path = self.config_path.clone();
        let config_arc = Arc::clone(&self.config);

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        // Debounced in the receiver
                        let _ = tx.send(());
                    }
                }
                Err(e) => {
                    error!("Config watcher error: {:?}", e);
                }
            }
        })?;

        if let Some(parent) = self.config_path.parent() {
            watcher.watch(parent, RecursiveMode::NonRecursive)?;
        }

        *self.watcher.write() = Some(watcher);

        tokio::spawn(async move {
            let mut last_reload = std::time::Instant::now();
            let debounce_duration = Duration::from_millis(500);

            while rx.recv().await.is_some() {
                if last_reload.elapsed() < debounce_duration {
                    continue;
                }

                // Let the writer finish
                tokio::time::sleep(Duration::from_millis(100)).await;

                match ForgeConfig::load(&config_path) {
                    Ok(new_config) => {
                        config_arc.store(Arc::new(new_config));
                        info!("Configuration hot-reloaded successfully");
                        last_reload = std::time::Instant::now();
                    }
                    Err(e) => {
                        warn!(
                            "Failed to hot-reload config: {}. Keeping previous config.",
                            e
                        );
                    }
                }
            }
        });

        info!("Configuration hot-reload watcher started");
        Ok(())
    }

    /// Stop watching for configuration changes
    pub fn stop_watching(&self) {
        *self.watcher.write() = None;
        info!("Configuration hot-reload watcher stopped");
    }
}

impl Clone for ForgeConfigManager {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            config_path: self.config_path.clone(),
            watcher: RwLock::new(None), // Watcher is not cloned
            reload_tx: self.reload_tx.clone(),
        }
    }
}
