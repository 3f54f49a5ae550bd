use serde::Deserialize;

use crate::oauth::provider::GrantStyle;

/// Complete deskbridge configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DeskbridgeConfig {
    #[serde(default)]
    pub provider: ProviderSettings,
    #[serde(default)]
    pub handshake: HandshakeSettings,
    #[serde(default)]
    pub exchange: ExchangeSettings,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub store: StoreSettings,
}

/// Upstream provider settings.
///
/// The OAuth client id and secret are not configured here; they come from the
/// DESKBRIDGE_OAUTH_CLIENT_ID and DESKBRIDGE_OAUTH_CLIENT_SECRET environment
/// variables.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSettings {
    /// Root domain that tenant subdomains are prefixed to
    #[serde(default = "default_provider_domain")]
    pub domain: String,
    /// Scopes requested during authorization
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    /// How the client proves itself during code exchange
    #[serde(default = "default_grant_style")]
    pub grant_style: GrantStyle,
    /// App identifier embedded in the dashboard redirect URI
    #[serde(default = "default_app_id")]
    pub app_id: String,
    /// Which dashboard mode the redirect URI targets
    #[serde(default = "default_mode")]
    pub mode: DashboardMode,
}

/// Dashboard mode for the OAuth redirect URI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DashboardMode {
    Live,
    Test,
}

impl ProviderSettings {
    /// Redirect URI the provider sends the user back to after consent.
    ///
    /// Test-mode dashboards live under a `/test/` path prefix.
    pub fn redirect_uri(&self) -> String {
        let prefix = match self.mode {
            DashboardMode::Live => "",
            DashboardMode::Test => "test/",
        };
        format!(
            "https://dashboard.stripe.com/{}apps-oauth/{}",
            prefix, self.app_id
        )
    }
}

fn default_provider_domain() -> String {
    "zendesk.com".to_string()
}

fn default_scopes() -> Vec<String> {
    vec!["read".to_string(), "write".to_string()]
}

fn default_grant_style() -> GrantStyle {
    GrantStyle::Pkce
}

fn default_app_id() -> String {
    "com.example.deskbridge".to_string()
}

fn default_mode() -> DashboardMode {
    DashboardMode::Test
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            domain: default_provider_domain(),
            scopes: default_scopes(),
            grant_style: default_grant_style(),
            app_id: default_app_id(),
            mode: default_mode(),
        }
    }
}

/// Handshake registry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HandshakeSettings {
    /// How long a pending handshake remains valid (seconds)
    #[serde(default = "default_handshake_expiry")]
    pub expiry_seconds: i64,
    /// How often expired handshakes are swept (seconds)
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
}

fn default_handshake_expiry() -> i64 {
    600
}

fn default_cleanup_interval() -> u64 {
    300
}

impl Default for HandshakeSettings {
    fn default() -> Self {
        Self {
            expiry_seconds: default_handshake_expiry(),
            cleanup_interval_seconds: default_cleanup_interval(),
        }
    }
}

/// Token exchange configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeSettings {
    /// Bound on each upstream call (token exchange and profile fetch)
    #[serde(default = "default_exchange_timeout")]
    pub timeout_seconds: u64,
}

fn default_exchange_timeout() -> u64 {
    30
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: default_exchange_timeout(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

/// Secret store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    /// Path to the SQLite database holding encrypted secrets
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String {
    "secrets.db".to_string()
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Default for DeskbridgeConfig {
    fn default() -> Self {
        Self {
            provider: ProviderSettings::default(),
            handshake: HandshakeSettings::default(),
            exchange: ExchangeSettings::default(),
            server: ServerSettings::default(),
            store: StoreSettings::default(),
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<DeskbridgeConfig, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    let config: DeskbridgeConfig = toml::from_str(&contents)?;
    Ok(config)
}
