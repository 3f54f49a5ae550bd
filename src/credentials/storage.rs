//! Encrypted named-secret storage backed by SQLite.
//!
//! Implements the [`SecretStore`] contract: opaque string payloads keyed by
//! `(scope, name)`, encrypted at rest with AES-256-GCM.

use super::{encryption, Secret, SecretScope, SecretStore};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode};
use std::path::Path;
use std::sync::Mutex;

/// SQLite-backed secret store.
///
/// # Schema
/// ```sql
/// CREATE TABLE secrets (
///     id INTEGER PRIMARY KEY,
///     scope TEXT NOT NULL,
///     name TEXT NOT NULL,
///     payload TEXT NOT NULL,   -- Encrypted
///     nonce TEXT NOT NULL,     -- Nonce for payload
///     created_at TEXT NOT NULL, -- ISO 8601 timestamp
///     UNIQUE(scope, name)
/// );
/// ```
///
/// `create` deliberately refuses to overwrite: a duplicate `(scope, name)`
/// is an error, and rotation goes through `delete_where` first. The
/// connection is wrapped in a Mutex; SQLite's ACID guarantees cover the rest.
pub struct SqliteSecretStore {
    conn: Mutex<Connection>,
    master_key: Vec<u8>,
}

impl SqliteSecretStore {
    /// Creates or opens a secret store.
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite database file (`:memory:` in tests)
    /// * `master_key` - Base64-encoded 32-byte master key
    pub fn new<P: AsRef<Path>>(db_path: P, master_key: &str) -> Result<Self> {
        let key_bytes = encryption::validate_key(master_key).context("Invalid encryption key")?;

        let conn = Connection::open(db_path).context("Failed to open database")?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS secrets (
                id INTEGER PRIMARY KEY,
                scope TEXT NOT NULL,
                name TEXT NOT NULL,
                payload TEXT NOT NULL,
                nonce TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(scope, name)
            )
            "#,
            [],
        )
        .context("Failed to create secrets table")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_scope_name ON secrets(scope, name)",
            [],
        )
        .context("Failed to create index")?;

        Ok(Self {
            conn: Mutex::new(conn),
            master_key: key_bytes,
        })
    }
}

#[async_trait]
impl SecretStore for SqliteSecretStore {
    async fn list(&self, scope: &SecretScope) -> Result<Vec<Secret>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT name, payload, nonce FROM secrets WHERE scope = ?1 ORDER BY name")
            .context("Failed to prepare query")?;

        let rows = stmt
            .query_map(params![scope.key()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .context("Failed to execute query")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read results")?;

        let mut secrets = Vec::with_capacity(rows.len());
        for (name, ciphertext, nonce) in rows {
            let payload = encryption::open(
                &encryption::SealedSecret { ciphertext, nonce },
                &self.master_key,
            )
            .with_context(|| format!("Failed to decrypt secret '{}'", name))?;
            secrets.push(Secret { name, payload });
        }

        Ok(secrets)
    }

    async fn create(&self, scope: &SecretScope, name: &str, payload: &str) -> Result<()> {
        let sealed = encryption::seal(payload, &self.master_key)
            .with_context(|| format!("Failed to encrypt secret '{}'", name))?;

        let now = Utc::now().to_rfc3339();

        let result = self.conn.lock().unwrap().execute(
            r#"
            INSERT INTO secrets (scope, name, payload, nonce, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![scope.key(), name, sealed.ciphertext, sealed.nonce, now],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                Err(anyhow!(
                    "Secret '{}' already exists in scope '{}'; delete it first",
                    name,
                    scope.key()
                ))
            }
            Err(e) => Err(e).context("Failed to store secret"),
        }
    }

    async fn delete_where(&self, scope: &SecretScope, name: &str) -> Result<bool> {
        let rows_affected = self
            .conn
            .lock()
            .unwrap()
            .execute(
                "DELETE FROM secrets WHERE scope = ?1 AND name = ?2",
                params![scope.key(), name],
            )
            .context("Failed to delete secret")?;

        Ok(rows_affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

    fn create_test_store() -> SqliteSecretStore {
        let key = BASE64.encode([0u8; 32]);
        SqliteSecretStore::new(":memory:", &key).expect("Failed to create test store")
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let store = create_test_store();
        let scope = SecretScope::Account;

        store
            .create(&scope, "zendesk_subdomain", "acme")
            .await
            .expect("Failed to create");
        store
            .create(&scope, "zendesk_access_token", "tok_123")
            .await
            .expect("Failed to create");

        let secrets = store.list(&scope).await.expect("Failed to list");
        assert_eq!(secrets.len(), 2);

        let token = secrets
            .iter()
            .find(|s| s.name == "zendesk_access_token")
            .unwrap();
        assert_eq!(token.payload, "tok_123");
    }

    #[tokio::test]
    async fn test_list_empty_scope() {
        let store = create_test_store();
        let secrets = store.list(&SecretScope::Account).await.unwrap();
        assert!(secrets.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_create_fails() {
        let store = create_test_store();
        let scope = SecretScope::Account;

        store.create(&scope, "zendesk_subdomain", "acme").await.unwrap();

        let err = store
            .create(&scope, "zendesk_subdomain", "globex")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));

        // Existing payload untouched
        let secrets = store.list(&scope).await.unwrap();
        assert_eq!(secrets[0].payload, "acme");
    }

    #[tokio::test]
    async fn test_delete_where_is_idempotent() {
        let store = create_test_store();
        let scope = SecretScope::Account;

        store.create(&scope, "zendesk_subdomain", "acme").await.unwrap();

        assert!(store.delete_where(&scope, "zendesk_subdomain").await.unwrap());
        // Second delete finds nothing, still succeeds
        assert!(!store.delete_where(&scope, "zendesk_subdomain").await.unwrap());
        // Deleting a name that never existed succeeds too
        assert!(!store.delete_where(&scope, "zendesk_access_token").await.unwrap());
    }

    #[tokio::test]
    async fn test_rotation_delete_then_create() {
        let store = create_test_store();
        let scope = SecretScope::Account;

        store.create(&scope, "zendesk_access_token", "tok_old").await.unwrap();

        store.delete_where(&scope, "zendesk_access_token").await.unwrap();
        store.create(&scope, "zendesk_access_token", "tok_new").await.unwrap();

        let secrets = store.list(&scope).await.unwrap();
        assert_eq!(secrets.len(), 1);
        assert_eq!(secrets[0].payload, "tok_new");
    }

    #[tokio::test]
    async fn test_scopes_are_isolated() {
        let store = create_test_store();
        let account = SecretScope::Account;
        let user = SecretScope::User("usr_1".to_string());

        store.create(&account, "zendesk_subdomain", "acme").await.unwrap();
        store.create(&user, "zendesk_subdomain", "globex").await.unwrap();

        let account_secrets = store.list(&account).await.unwrap();
        assert_eq!(account_secrets.len(), 1);
        assert_eq!(account_secrets[0].payload, "acme");

        let user_secrets = store.list(&user).await.unwrap();
        assert_eq!(user_secrets.len(), 1);
        assert_eq!(user_secrets[0].payload, "globex");
    }

    #[tokio::test]
    async fn test_payload_encrypted_at_rest() {
        let key = BASE64.encode([0u8; 32]);
        let store = SqliteSecretStore::new(":memory:", &key).unwrap();
        let scope = SecretScope::Account;

        store.create(&scope, "zendesk_access_token", "tok_plain").await.unwrap();

        let raw: String = store
            .conn
            .lock()
            .unwrap()
            .query_row("SELECT payload FROM secrets", [], |row| row.get(0))
            .unwrap();
        assert_ne!(raw, "tok_plain");
    }

    #[tokio::test]
    async fn test_secrets_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("secrets.db");
        let key = BASE64.encode([7u8; 32]);
        let scope = SecretScope::Account;

        {
            let store = SqliteSecretStore::new(&db_path, &key).unwrap();
            store
                .create(&scope, "zendesk_access_token", "tok_persisted")
                .await
                .unwrap();
        }

        let reopened = SqliteSecretStore::new(&db_path, &key).unwrap();
        let secrets = reopened.list(&scope).await.unwrap();
        assert_eq!(secrets.len(), 1);
        assert_eq!(secrets[0].payload, "tok_persisted");
    }

    #[test]
    fn test_invalid_master_key() {
        assert!(SqliteSecretStore::new(":memory:", "short").is_err());
        assert!(SqliteSecretStore::new(":memory:", "not-valid-base64!@#$").is_err());
    }
}
