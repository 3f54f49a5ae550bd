use anyhow::{bail, Context, Result};
use deskbridge::credentials::{
    ConnectionCredentials, SecretScope, SecretStore, SqliteSecretStore,
};
use std::sync::Arc;
use tracing::info;
use zendesk_connector::ZendeskClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zendesk_connector=info".into()),
        )
        .init();

    info!("Zendesk connector starting...");

    // Read configuration from environment (shared with the deskbridge service)
    let encryption_key = std::env::var("DESKBRIDGE_ENCRYPTION_KEY")
        .context("DESKBRIDGE_ENCRYPTION_KEY is required (base64-encoded 32-byte key)")?;

    let secrets_db =
        std::env::var("DESKBRIDGE_SECRETS_DB").unwrap_or_else(|_| "secrets.db".to_string());

    // Open the store the connection flow writes to
    let store = Arc::new(
        SqliteSecretStore::new(&secrets_db, &encryption_key)
            .context("Failed to open secret store")?,
    );
    info!(secrets_db = %secrets_db, "Secret store opened");

    let secrets = store
        .list(&SecretScope::Account)
        .await
        .context("Failed to list stored secrets")?;

    let Some(creds) = ConnectionCredentials::from_secrets(&secrets) else {
        bail!("No stored connection - complete the OAuth flow first");
    };

    info!(subdomain = %creds.subdomain, "Using stored connection");

    let client = ZendeskClient::for_subdomain(&creds.subdomain, creds.access_token);

    let user = client
        .fetch_current_user()
        .await
        .context("Failed to fetch authenticated user")?;
    info!(
        user_id = user.id,
        name = %user.name,
        email = ?user.email,
        "Authenticated against Zendesk"
    );

    let tickets = client
        .fetch_requested_tickets(user.id)
        .await
        .context("Failed to fetch requested tickets")?;
    info!(count = tickets.len(), "Fetched requested tickets");

    for ticket in &tickets {
        info!(
            id = ticket.id,
            status = ?ticket.status,
            priority = ?ticket.priority,
            subject = %ticket.subject,
            "Ticket"
        );
    }

    Ok(())
}
