//! Device push-token registration.
//!
//! Permission prompts and platform registration happen on the device; once
//! the platform hands over a token it is stored on the member row so lodge
//! secretaries can target notifications.

use tracing::info;

use crate::auth::Session;
use crate::error::{LodgeError, LodgeResult};
use crate::store::MemberDirectory;

pub async fn save_push_token<D>(directory: &D, session: &Session, token: &str) -> LodgeResult<()>
where
    D: MemberDirectory + ?Sized,
{
    let identity = session.identity().ok_or(LodgeError::NotSignedIn)?;
    let token = token.trim();
    if token.is_empty() {
        return Err(LodgeError::InvalidInput("Push token is empty".into()));
    }
    directory.save_push_token(&identity.id, token).await?;
    info!(identity = %identity.id, "Push token registered");
    Ok(())
}
