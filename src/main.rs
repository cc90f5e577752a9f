//! Binary entrypoint for the AgentForge server.
//!
//! Reads `agentforge.toml` (or the file given with `--config`), connects to
//! the configured database and serves the workflow config API.

use agentforge::{
    api::routes::build_app,
    auth::jwt::AuthService,
    cli::{Cli, Commands},
    db::DatabaseProvider,
    utils::toml_config::{ConfigError, ForgeConfig, ForgeConfigManager},
    workflows::HttpContentTypeSniffer,
    AppState,
};
use anyhow::Context;
use std::{sync::Arc, time::Duration};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();

    let config_manager = match ForgeConfigManager::new(&cli.config) {
        Ok(manager) => Some(manager),
        Err(ConfigError::FileNotFound(_)) => None,
        Err(e) => return Err(e).context("Failed to load configuration"),
    };

    let config = config_manager
        .as_ref()
        .map(|m| m.config())
        .unwrap_or_else(|| Arc::new(ForgeConfig::default()));

    let default_level = if cli.verbose {
        "debug".to_string()
    } else {
        config.server.log_level.clone()
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config_manager.is_none() {
        tracing::warn!(
            "Config file {:?} not found, using built-in defaults",
            cli.config
        );
    }

    let jwt_secret = config.jwt_secret().context("JWT secret is not configured")?;
    let auth_service = Arc::new(AuthService::new(jwt_secret, config.auth.jwt_expiry));

    if let Commands::Token { user } = cli.subcommand() {
        let token = auth_service.generate_token(user)?;
        println!("{}", token.access_token);
        return Ok(());
    }

    let config_manager = match config_manager {
        Some(mut manager) => {
            manager
                .start_watching()
                .context("Failed to watch configuration file")?;
            Arc::new(manager)
        }
        None => Arc::new(ForgeConfigManager::from_config(ForgeConfig::default())),
    };

    let provider = DatabaseProvider::from_url(&config.database.url, config.turso_credentials());
    if let DatabaseProvider::SQLite { path } = &provider {
        if let Some(parent) = std::path::Path::new(path).parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory {:?}", parent))?;
        }
    }
    let gateway = Arc::new(
        provider
            .create_client()
            .await
            .context("Failed to open database")?,
    );
    tracing::info!("Database ready");

    let sniffer = Arc::new(HttpContentTypeSniffer::new(Duration::from_secs(
        config.sniffer.timeout_secs,
    ))?);

    let state = AppState {
        config_manager,
        gateway,
        sniffer,
        auth_service,
    };

    let app = build_app(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("AgentForge server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
