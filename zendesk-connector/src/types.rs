use serde::Deserialize;

/// Ticket lifecycle state.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    New,
    Open,
    Pending,
    Solved,
    Closed,
}

/// Ticket priority.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TicketPriority {
    Low,
    Normal,
    High,
    Urgent,
}

/// Zendesk ticket.
#[derive(Clone, Debug, Deserialize)]
pub struct ZendeskTicket {
    pub id: u64,
    pub subject: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: TicketStatus,
    #[serde(default)]
    pub priority: Option<TicketPriority>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub assignee_id: Option<u64>,
    pub requester_id: u64,
}

/// Zendesk user (agent or end user).
#[derive(Clone, Debug, Deserialize)]
pub struct ZendeskUser {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}
