//! Data models for lodge entities.
//!
//! Rows are owned by the remote store; these are read-only or
//! write-through copies:
//!
//! - `Event`, `Lodge`: lodge events and their owning lodge
//! - `MemberRsvp`, `VisitorRsvp`, `Guest`, `VisitorAdditionalGuest`:
//!   everything that contributes to attendance
//! - `Member`, `LodgeMembership`: the signed-in member and their lodges
//! - `InvitationToken`: one-time app invitation codes
//! - `ChapterMeeting`: public chapter meetings calendar

pub mod event;
pub mod invitation;
pub mod meeting;
pub mod member;
pub mod rsvp;

pub use event::{lodge_display_name, Event, Lodge};
pub use invitation::{InvitationToken, APP_INVITATION};
pub use meeting::{ChapterMeeting, MeetingType};
pub use member::{LodgeMembership, Member};
pub use rsvp::{Guest, MemberRsvp, NewRsvp, RsvpStatus, VisitorAdditionalGuest, VisitorRsvp};

/// Read a nullable text column as an empty string.
///
/// Pair with `#[serde(default)]` so a missing column reads the same way.
pub(crate) fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}
