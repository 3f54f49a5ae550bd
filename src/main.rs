use anyhow::{anyhow, bail, Context, Result};
use deskbridge::api::{
    create_connection_router, create_exchange_router, ConnectionAppState, ExchangeAppState,
};
use deskbridge::config::{self, DeskbridgeConfig};
use deskbridge::connection::ConnectionManager;
use deskbridge::credentials::{SecretScope, SqliteSecretStore};
use deskbridge::oauth::exchange::ExchangeClient;
use deskbridge::oauth::handshake::{run_handshake_cleanup, HandshakeRegistry};
use deskbridge::oauth::provider::{GrantStyle, ProviderConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deskbridge=info".into()),
        )
        .init();

    info!("deskbridge starting...");

    // Read configuration: TOML file if present, defaults otherwise
    let config_path =
        std::env::var("DESKBRIDGE_CONFIG").unwrap_or_else(|_| "deskbridge.toml".to_string());
    let config = if std::path::Path::new(&config_path).exists() {
        config::load_config(&config_path)
            .map_err(|e| anyhow!("Failed to load config from {}: {}", config_path, e))?
    } else {
        DeskbridgeConfig::default()
    };

    // OAuth app credentials and the master key come from the environment
    let client_id = std::env::var("DESKBRIDGE_OAUTH_CLIENT_ID")
        .context("DESKBRIDGE_OAUTH_CLIENT_ID is required")?;
    let client_secret = std::env::var("DESKBRIDGE_OAUTH_CLIENT_SECRET").ok();
    let encryption_key = std::env::var("DESKBRIDGE_ENCRYPTION_KEY")
        .context("DESKBRIDGE_ENCRYPTION_KEY is required (base64-encoded 32-byte key)")?;

    if config.provider.grant_style == GrantStyle::ClientSecret && client_secret.is_none() {
        bail!("DESKBRIDGE_OAUTH_CLIENT_SECRET is required for the client_secret grant style");
    }

    info!(
        provider_domain = %config.provider.domain,
        grant_style = ?config.provider.grant_style,
        bind_addr = %config.server.bind_addr,
        "Configuration loaded"
    );

    let provider = ProviderConfig {
        domain: config.provider.domain.clone(),
        client_id,
        client_secret,
        scopes: config.provider.scopes.clone(),
        grant_style: config.provider.grant_style,
        redirect_uri: config.provider.redirect_uri(),
    };

    // Secret store (shared by the manager and the connector runner)
    let store = Arc::new(
        SqliteSecretStore::new(&config.store.db_path, &encryption_key)
            .context("Failed to initialize secret store")?,
    );
    info!(db_path = %config.store.db_path, "Secret store initialized");

    let exchange = Arc::new(ExchangeClient::new(
        &provider,
        Duration::from_secs(config.exchange.timeout_seconds),
    ));

    let handshakes = HandshakeRegistry::new(config.handshake.expiry_seconds);
    tokio::spawn(run_handshake_cleanup(
        handshakes.clone(),
        config.handshake.cleanup_interval_seconds,
    ));

    let manager = Arc::new(ConnectionManager::new(
        store,
        SecretScope::Account,
        provider.clone(),
        Arc::clone(&exchange),
        handshakes,
    ));

    // Settle into Connected or Disconnected before serving
    manager.check_existing_connection().await;
    info!(
        status = manager.snapshot().status.name(),
        "Existing connection checked"
    );

    let app = create_connection_router(ConnectionAppState {
        manager: Arc::clone(&manager),
    })
    .merge(create_exchange_router(ExchangeAppState {
        provider,
        exchange,
        endpoint_base: None,
    }));

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;
    info!(addr = %config.server.bind_addr, "Listening");

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
