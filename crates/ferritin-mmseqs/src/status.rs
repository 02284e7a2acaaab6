//! Ticket states reported by the MMseqs2 server.
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TicketStatus {
    RateLimit,
    Running,
    Pending,
    Complete,
    Error,
    #[serde(other)]
    Unknown,
}

/// What the client does next for a given status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAction {
    /// Transient trouble; repeat the request after a delay.
    Retry,
    /// The job is queued or running.
    Wait,
    Success,
    /// The server rejected the input. Never retried.
    Fatal,
}

impl TicketStatus {
    pub fn action(self) -> StatusAction {
        match self {
            TicketStatus::Unknown | TicketStatus::RateLimit => StatusAction::Retry,
            TicketStatus::Running | TicketStatus::Pending => StatusAction::Wait,
            TicketStatus::Complete => StatusAction::Success,
            TicketStatus::Error => StatusAction::Fatal,
        }
    }
}

/// Response body of `/ticket/msa` and `/ticket/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Ticket {
    pub status: TicketStatus,
    #[serde(default)]
    pub id: Option<String>,
}

impl Ticket {
    pub fn unknown() -> Self {
        Self {
            status: TicketStatus::Unknown,
            id: None,
        }
    }

    /// Parse a server response. Anything that is not a well formed ticket is `UNKNOWN`.
    pub fn from_body(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_else(|_| Self::unknown())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_actions() {
        assert_eq!(TicketStatus::Unknown.action(), StatusAction::Retry);
        assert_eq!(TicketStatus::RateLimit.action(), StatusAction::Retry);
        assert_eq!(TicketStatus::Running.action(), StatusAction::Wait);
        assert_eq!(TicketStatus::Pending.action(), StatusAction::Wait);
        assert_eq!(TicketStatus::Complete.action(), StatusAction::Success);
        assert_eq!(TicketStatus::Error.action(), StatusAction::Fatal);
    }

    #[test]
    fn test_ticket_parsing() {
        let ticket = Ticket::from_body(r#"{"status": "RUNNING", "id": "abc123"}"#);
        assert_eq!(ticket.status, TicketStatus::Running);
        assert_eq!(ticket.id.as_deref(), Some("abc123"));

        let ticket = Ticket::from_body(r#"{"status": "RATELIMIT"}"#);
        assert_eq!(ticket.status, TicketStatus::RateLimit);
        assert_eq!(ticket.id, None);
    }

    #[test]
    fn test_malformed_bodies_are_unknown() {
        assert_eq!(Ticket::from_body("<html>502</html>"), Ticket::unknown());
        assert_eq!(Ticket::from_body(""), Ticket::unknown());
        let ticket = Ticket::from_body(r#"{"status": "MAINTENANCE", "id": "x"}"#);
        assert_eq!(ticket.status, TicketStatus::Unknown);
        assert_ne!(ticket.status.action(), StatusAction::Success);
    }
}
