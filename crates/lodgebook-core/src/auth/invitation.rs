//! Invitation redemption and first-time account setup.
//!
//! Lodge secretaries issue a one-time code per member. Redeeming it consumes
//! the code and moves the member to account setup, where they choose the
//! email and password they will sign in with from then on.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::api::ApiError;
use crate::error::{LodgeError, LodgeResult};
use crate::models::Member;
use crate::store::{IdentityProvider, InvitationLedger, MemberDirectory};

/// Minimum password length accepted at account setup
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Result of a successful redemption
#[derive(Debug, Clone, PartialEq)]
pub struct Redemption {
    pub member: Member,
    pub needs_account_setup: bool,
}

/// Redeem an invitation code.
///
/// A code is only ever consumed once; a second attempt reports it as
/// already redeemed and creates nothing.
pub async fn redeem_invitation<S>(store: &S, code: &str, now: DateTime<Utc>) -> LodgeResult<Redemption>
where
    S: InvitationLedger + MemberDirectory + ?Sized,
{
    let code = code.trim();
    if code.is_empty() {
        return Err(LodgeError::InvalidInvitation);
    }

    let token = store
        .invitation(code)
        .await?
        .filter(|t| t.is_app_invitation())
        .ok_or(LodgeError::InvalidInvitation)?;

    if token.is_used() {
        info!(invitation = %token.id, "Invitation already redeemed");
        return Err(LodgeError::AlreadyRedeemed);
    }
    if token.is_expired(now) {
        return Err(LodgeError::InvalidInvitation);
    }

    let member = store
        .member_by_id(&token.member_id)
        .await?
        .ok_or_else(|| {
            warn!(member_id = %token.member_id, "Invitation points at a missing member");
            LodgeError::MissingData("Member not found for this invitation".into())
        })?;

    if member.has_account() {
        return Err(LodgeError::AccountExists);
    }

    match store.mark_used(&token.id, now).await {
        Ok(()) => {}
        // Lost a race with another redemption of the same code
        Err(ApiError::NotFound(_)) => return Err(LodgeError::AlreadyRedeemed),
        Err(e) => return Err(e.into()),
    }

    info!(member_id = %member.id, "Invitation redeemed");
    Ok(Redemption {
        member,
        needs_account_setup: true,
    })
}

/// Check the account-setup form before anything is sent
pub fn validate_new_password(password: &str, confirm: &str) -> LodgeResult<()> {
    if password != confirm {
        return Err(LodgeError::InvalidInput("Passwords do not match".into()));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(LodgeError::InvalidInput(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

/// Create the member's identity and link it to their member row
pub async fn create_account<I, D>(
    identity: &I,
    directory: &D,
    member_id: &str,
    email: &str,
    password: &str,
) -> LodgeResult<Member>
where
    I: IdentityProvider + ?Sized,
    D: MemberDirectory + ?Sized,
{
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(LodgeError::InvalidInput("Please enter a valid email address".into()));
    }

    let existing = directory
        .member_by_id(member_id)
        .await?
        .ok_or_else(|| LodgeError::MissingData("Member not found for this invitation".into()))?;
    if existing.has_account() {
        return Err(LodgeError::AccountExists);
    }

    let created = identity.sign_up(email, password).await.map_err(|e| match e {
        ApiError::BadRequest(msg) => {
            LodgeError::AuthenticationFailed(format!("Failed to create account: {}", msg))
        }
        other => LodgeError::Store(other),
    })?;

    directory.link_identity(member_id, &created.id, email).await?;
    info!(member_id = member_id, "Account created and linked");

    Ok(Member {
        auth_user_id: Some(created.id),
        email: email.to_string(),
        ..existing
    })
}
