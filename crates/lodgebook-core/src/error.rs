//! Domain error taxonomy.
//!
//! Every failure a member can run into is surfaced as exactly one
//! human-readable message. Nothing here is retried automatically and
//! nothing is fatal to the process; callers return the member to a safe
//! screen (usually sign-in) or show the message inline.

use thiserror::Error;

use crate::api::ApiError;

#[derive(Error, Debug)]
pub enum LodgeError {
    #[error("Invalid or expired invitation code")]
    InvalidInvitation,

    #[error("This invitation code has already been redeemed")]
    AlreadyRedeemed,

    #[error("An account already exists for this member - please sign in")]
    AccountExists,

    #[error("Login failed: {0}")]
    AuthenticationFailed(String),

    #[error("Not signed in")]
    NotSignedIn,

    #[error("{0}")]
    MissingData(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Could not reach the lodge database: {0}")]
    Store(#[from] ApiError),
}

impl LodgeError {
    /// Message shown to the member at the point of failure
    pub fn user_message(&self) -> String {
        self.to_string()
    }

    /// Whether the member should be sent back to the sign-in screen
    pub fn returns_to_sign_in(&self) -> bool {
        matches!(
            self,
            LodgeError::InvalidInvitation
                | LodgeError::AlreadyRedeemed
                | LodgeError::AccountExists
                | LodgeError::NotSignedIn
                | LodgeError::Store(ApiError::Unauthorized)
        )
    }
}

pub type LodgeResult<T> = Result<T, LodgeError>;
