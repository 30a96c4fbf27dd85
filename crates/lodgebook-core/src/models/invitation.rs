use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Invitation type that grants app access
pub const APP_INVITATION: &str = "app_invitation";

/// One-time invitation code stored in `rsvp_tokens`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvitationToken {
    pub id: String,
    pub token: String,
    pub member_id: String,
    pub invitation_type: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub used_at: Option<DateTime<Utc>>,
}

impl InvitationToken {
    pub fn is_app_invitation(&self) -> bool {
        self.invitation_type == APP_INVITATION
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }
}
