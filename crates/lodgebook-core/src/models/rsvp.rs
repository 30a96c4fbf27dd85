use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RsvpStatus {
    Attending,
    NotAttending,
    Pending,
}

impl RsvpStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RsvpStatus::Attending => "attending",
            RsvpStatus::NotAttending => "not_attending",
            RsvpStatus::Pending => "pending",
        }
    }

    /// Parse user input such as "yes", "attending" or "not_attending"
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "attending" | "yes" | "y" | "going" => Some(RsvpStatus::Attending),
            "not_attending" | "not-attending" | "no" | "n" | "not going" => {
                Some(RsvpStatus::NotAttending)
            }
            "pending" => Some(RsvpStatus::Pending),
            _ => None,
        }
    }
}

impl std::fmt::Display for RsvpStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RsvpStatus::Attending => write!(f, "Attending"),
            RsvpStatus::NotAttending => write!(f, "Not Attending"),
            RsvpStatus::Pending => write!(f, "Pending"),
        }
    }
}

/// A member's response to an event. One row per (event, member).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberRsvp {
    pub id: String,
    pub event_id: String,
    #[serde(default)]
    pub member_id: String,
    pub status: RsvpStatus,
    #[serde(default)]
    pub responded_at: Option<DateTime<Utc>>,
}

/// Insert payload for a first response
#[derive(Debug, Clone, Serialize)]
pub struct NewRsvp {
    pub event_id: String,
    pub member_id: String,
    pub status: RsvpStatus,
    pub responded_at: DateTime<Utc>,
}

/// Registration by a non-member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitorRsvp {
    pub id: String,
    pub event_id: String,
}

/// Plus-one brought by a member, linked through the member's RSVP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guest {
    pub id: String,
    pub rsvp_id: String,
}

/// Plus-one brought by a visitor, linked through the visitor's RSVP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitorAdditionalGuest {
    pub id: String,
    pub visitor_rsvp_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_format() {
        let rsvp: MemberRsvp = serde_json::from_str(
            r#"{"id": "r1", "event_id": "e1", "member_id": "m1", "status": "not_attending", "responded_at": "2026-01-02T10:00:00+00:00"}"#,
        )
        .unwrap();
        assert_eq!(rsvp.status, RsvpStatus::NotAttending);
        assert!(rsvp.responded_at.is_some());

        assert_eq!(serde_json::to_string(&RsvpStatus::Attending).unwrap(), "\"attending\"");
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(RsvpStatus::parse("Yes"), Some(RsvpStatus::Attending));
        assert_eq!(RsvpStatus::parse("not_attending"), Some(RsvpStatus::NotAttending));
        assert_eq!(RsvpStatus::parse(" no "), Some(RsvpStatus::NotAttending));
        assert_eq!(RsvpStatus::parse("pending"), Some(RsvpStatus::Pending));
        assert_eq!(RsvpStatus::parse("maybe"), None);
    }
}
