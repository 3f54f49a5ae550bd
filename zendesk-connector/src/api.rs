use anyhow::{anyhow, Context, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::types::{ZendeskTicket, ZendeskUser};

#[derive(Debug, Deserialize)]
struct CurrentUserResponse {
    user: ZendeskUser,
}

#[derive(Debug, Deserialize)]
struct UsersResponse {
    users: Vec<ZendeskUser>,
}

#[derive(Debug, Deserialize)]
struct TicketsResponse {
    tickets: Vec<ZendeskTicket>,
}

/// HTTP client for the Zendesk REST API.
///
/// Authenticates with the OAuth bearer token stored by the connection flow.
/// Endpoints are tenant-addressed, so the client is bound to one subdomain.
pub struct ZendeskClient {
    access_token: String,
    http_client: Client,
    base_url: String,
}

impl ZendeskClient {
    /// Create a client for a tenant subdomain.
    pub fn for_subdomain(subdomain: &str, access_token: String) -> Self {
        Self::with_base_url(
            access_token,
            format!("https://{}.zendesk.com/api/v2", subdomain),
        )
    }

    /// Create a client with a custom base URL (for testing with a mock server).
    pub fn with_base_url(access_token: String, base_url: String) -> Self {
        let http_client = Client::builder()
            .user_agent("zendesk-connector/1.0")
            .build()
            .expect("Failed to build HTTP client");
        Self {
            access_token,
            http_client,
            base_url,
        }
    }

    /// Fetch the authenticated user.
    pub async fn fetch_current_user(&self) -> Result<ZendeskUser> {
        let url = format!("{}/users/me.json", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .context("Failed to send fetch_current_user request")?;

        check_response_status(&response)?;
        let body: CurrentUserResponse = response
            .json()
            .await
            .context("Failed to parse current user response")?;
        Ok(body.user)
    }

    /// Search users by email address.
    pub async fn search_users(&self, email: &str) -> Result<Vec<ZendeskUser>> {
        let url = format!(
            "{}/users/search.json?query={}",
            self.base_url,
            urlencoding::encode(email)
        );
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .context("Failed to send search_users request")?;

        check_response_status(&response)?;
        let body: UsersResponse = response
            .json()
            .await
            .context("Failed to parse user search response")?;
        Ok(body.users)
    }

    /// Fetch the tickets a user has requested.
    pub async fn fetch_requested_tickets(&self, user_id: u64) -> Result<Vec<ZendeskTicket>> {
        let url = format!("{}/users/{}/tickets/requested.json", self.base_url, user_id);
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .context("Failed to send fetch_requested_tickets request")?;

        check_response_status(&response)?;
        let body: TicketsResponse = response
            .json()
            .await
            .context("Failed to parse tickets response")?;
        Ok(body.tickets)
    }
}

/// Check the response status and map known error codes to descriptive errors.
///
/// - 401 → auth error (token revoked or expired; re-run the connection flow)
/// - 429 → rate limited (logs Retry-After)
/// - Other non-2xx → generic API error
fn check_response_status(response: &reqwest::Response) -> Result<()> {
    match response.status() {
        StatusCode::UNAUTHORIZED => Err(anyhow!(
            "Zendesk auth error: token revoked or expired"
        )),
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0);
            Err(anyhow!(
                "Zendesk rate limit exceeded (Retry-After: {}s)",
                retry_after
            ))
        }
        s if !s.is_success() => Err(anyhow!("Zendesk API error: {}", s)),
        _ => Ok(()),
    }
}
