//! Zendesk REST client for the deskbridge integration.
//!
//! Consumes the credentials the connection flow stored (tenant subdomain and
//! OAuth access token) and fetches the data the dashboard surfaces: the
//! authenticated user, end users looked up by email, and the tickets they
//! requested.
//!
//! # Architecture
//!
//! ```text
//! deskbridge secret store
//!          ↓ (subdomain + access token)
//! ┌─────────────────────────────────────────┐
//! │       ZendeskClient                      │
//! │  - users/me, user search, tickets        │
//! │  - Bearer auth, status mapping           │
//! └─────────────────────────────────────────┘
//!          ↓
//!   Dashboard collaborators
//! ```

pub mod api;
pub mod types;

pub use api::ZendeskClient;
pub use types::{TicketPriority, TicketStatus, ZendeskTicket, ZendeskUser};
