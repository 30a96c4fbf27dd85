//! Authentication, invitations and the member session.
//!
//! This module provides:
//! - `Session`: the typed session every screen receives (loading, absent,
//!   or active with the member row)
//! - `SessionFile`: access/refresh token persistence in the cache directory
//! - `CredentialStore`: remembered passwords in the OS keychain
//! - Invitation redemption, account setup and password sign-in flows

pub mod credentials;
pub mod invitation;
pub mod session;
pub mod signin;

pub use credentials::CredentialStore;
pub use invitation::{
    create_account, redeem_invitation, validate_new_password, Redemption, MIN_PASSWORD_LENGTH,
};
pub use session::{ActiveSession, Identity, Session, SessionData, SessionFile};
pub use signin::{
    authenticate, refresh_if_needed, resolve_member, resolve_session, sign_in, sign_out,
    SignedIn,
};
