//! Password sign-in and session resolution.

use tracing::{debug, info};

use crate::api::ApiError;
use crate::error::{LodgeError, LodgeResult};
use crate::store::{IdentityProvider, MemberDirectory};

use super::session::{ActiveSession, Identity, Session, SessionData};

/// A completed sign-in: the tokens to persist and the resolved member
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub tokens: SessionData,
    pub session: ActiveSession,
}

/// Sign in with email and password and resolve the member row.
///
/// Credentials that work but belong to no member are reported as missing
/// data, since the member cannot use the app without a member row.
pub async fn sign_in<I, D>(
    identity: &I,
    directory: &D,
    email: &str,
    password: &str,
) -> LodgeResult<SignedIn>
where
    I: IdentityProvider + ?Sized,
    D: MemberDirectory + ?Sized,
{
    let tokens = authenticate(identity, email, password).await?;
    let session = resolve_member(directory, tokens.identity.clone()).await?;
    info!(member_id = %session.member.id, "Signed in");
    Ok(SignedIn { tokens, session })
}

/// Exchange email and password for tokens without touching member rows.
///
/// Front ends that need the member lookup to run under the new token call
/// this, then `resolve_member` with an authenticated store.
pub async fn authenticate<I>(identity: &I, email: &str, password: &str) -> LodgeResult<SessionData>
where
    I: IdentityProvider + ?Sized,
{
    identity
        .sign_in(email.trim(), password)
        .await
        .map_err(|e| match e {
            ApiError::BadRequest(msg) => LodgeError::AuthenticationFailed(auth_message(&msg)),
            ApiError::Unauthorized => {
                LodgeError::AuthenticationFailed("Invalid login credentials".into())
            }
            other => LodgeError::Store(other),
        })
}

/// Map an identity to its member row
pub async fn resolve_member<D>(directory: &D, identity: Identity) -> LodgeResult<ActiveSession>
where
    D: MemberDirectory + ?Sized,
{
    let member = directory
        .member_by_identity(&identity.id)
        .await?
        .ok_or_else(|| LodgeError::MissingData("No member record is linked to this account".into()))?;
    Ok(ActiveSession { identity, member })
}

/// Resolve the current session from the identity service.
///
/// No identity, or an identity without a member row, is `Session::Absent`.
pub async fn resolve_session<I, D>(identity: &I, directory: &D) -> LodgeResult<Session>
where
    I: IdentityProvider + ?Sized,
    D: MemberDirectory + ?Sized,
{
    let Some(current) = identity.current_identity().await? else {
        debug!("No current identity");
        return Ok(Session::Absent);
    };

    match resolve_member(directory, current).await {
        Ok(active) => Ok(Session::Active(active)),
        Err(LodgeError::MissingData(_)) => Ok(Session::Absent),
        Err(e) => Err(e),
    }
}

/// Refresh tokens that are close to expiry; others are returned unchanged
pub async fn refresh_if_needed<I>(identity: &I, tokens: SessionData) -> LodgeResult<SessionData>
where
    I: IdentityProvider + ?Sized,
{
    if !tokens.needs_refresh() {
        return Ok(tokens);
    }
    debug!(minutes_left = tokens.minutes_until_expiry(), "Refreshing session");
    identity
        .refresh(&tokens.refresh_token)
        .await
        .map_err(|e| match e {
            ApiError::BadRequest(_) | ApiError::Unauthorized => LodgeError::NotSignedIn,
            other => LodgeError::Store(other),
        })
}

pub async fn sign_out<I>(identity: &I) -> LodgeResult<()>
where
    I: IdentityProvider + ?Sized,
{
    identity
        .sign_out()
        .await
        .map_err(|e| LodgeError::AuthenticationFailed(format!("Sign out failed: {}", e)))
}

/// Pull the human-readable message out of an identity-service error body
fn auth_message(body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct AuthErrorBody {
        #[serde(alias = "error_description", alias = "msg")]
        message: Option<String>,
    }
    serde_json::from_str::<AuthErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{member, MemoryStore};

    async fn store_with_account() -> MemoryStore {
        let store = MemoryStore::new();
        let identity = store.sign_up("john@lodge.org", "secret1").await.unwrap();
        *store.members.lock().unwrap() = vec![member("m1", Some(&identity.id), Some("l1"))];
        store.calls.lock().unwrap().clear();
        store
    }

    #[tokio::test]
    async fn test_sign_in_resolves_member() {
        let store = store_with_account().await;
        let signed_in = sign_in(&store, &store, " john@lodge.org ", "secret1").await.unwrap();
        assert_eq!(signed_in.session.member.id, "m1");
        assert_eq!(signed_in.tokens.identity, signed_in.session.identity);
    }

    #[tokio::test]
    async fn test_bad_credentials() {
        let store = store_with_account().await;
        let err = sign_in(&store, &store, "john@lodge.org", "wrong").await.unwrap_err();
        assert_eq!(err.user_message(), "Login failed: Invalid login credentials");
    }

    #[tokio::test]
    async fn test_resolve_session_states() {
        let store = store_with_account().await;
        assert_eq!(resolve_session(&store, &store).await.unwrap(), Session::Absent);

        sign_in(&store, &store, "john@lodge.org", "secret1").await.unwrap();
        let session = resolve_session(&store, &store).await.unwrap();
        assert_eq!(session.member().map(|m| m.id.as_str()), Some("m1"));

        sign_out(&store).await.unwrap();
        assert_eq!(resolve_session(&store, &store).await.unwrap(), Session::Absent);
    }

    #[tokio::test]
    async fn test_identity_without_member_is_absent() {
        let store = store_with_account().await;
        store.members.lock().unwrap().clear();
        store.sign_in("john@lodge.org", "secret1").await.unwrap();
        assert_eq!(resolve_session(&store, &store).await.unwrap(), Session::Absent);
    }

    #[tokio::test]
    async fn test_refresh_if_needed() {
        let store = store_with_account().await;
        let signed_in = sign_in(&store, &store, "john@lodge.org", "secret1").await.unwrap();

        let fresh = refresh_if_needed(&store, signed_in.tokens.clone()).await.unwrap();
        assert_eq!(fresh.access_token, signed_in.tokens.access_token);

        let mut stale = signed_in.tokens.clone();
        stale.expires_at = chrono::Utc::now() + chrono::Duration::minutes(2);
        let refreshed = refresh_if_needed(&store, stale).await.unwrap();
        assert_ne!(refreshed.access_token, signed_in.tokens.access_token);
    }

    #[tokio::test]
    async fn test_authenticate_skips_member_lookup() {
        let store = store_with_account().await;
        let tokens = authenticate(&store, "john@lodge.org", "secret1").await.unwrap();
        assert!(tokens.access_token.starts_with("access-"));
        assert_eq!(store.calls(), vec!["sign_in"]);

        store.fail_on("sign_in");
        let err = authenticate(&store, "john@lodge.org", "secret1").await.unwrap_err();
        assert!(matches!(err, LodgeError::Store(ApiError::ServerError(_))));
    }

    #[test]
    fn test_auth_message() {
        assert_eq!(
            auth_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            "Invalid login credentials"
        );
        assert_eq!(auth_message(r#"{"msg":"Email not confirmed"}"#), "Email not confirmed");
        assert_eq!(auth_message("plain text"), "plain text");
    }
}
