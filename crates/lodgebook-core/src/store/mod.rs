//! Seams between the app's logic and the remote store.
//!
//! `StoreClient` implements every trait here against the hosted database;
//! tests substitute an in-memory store. Each trait covers one table family
//! so flows only ask for what they touch.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::api::ApiError;
use crate::auth::{Identity, SessionData};
use crate::models::{
    ChapterMeeting, Event, Guest, InvitationToken, Lodge, Member, MemberRsvp, NewRsvp,
    VisitorAdditionalGuest, VisitorRsvp,
};

#[cfg(test)]
pub(crate) mod memory;

/// Everything that contributes to an event's attendance.
/// An empty id list yields an empty result without a request.
#[async_trait]
pub trait AttendanceSource: Send + Sync {
    async fn member_rsvps(&self, event_ids: &[String]) -> Result<Vec<MemberRsvp>, ApiError>;

    async fn visitor_rsvps(&self, event_ids: &[String]) -> Result<Vec<VisitorRsvp>, ApiError>;

    async fn guests(&self, rsvp_ids: &[String]) -> Result<Vec<Guest>, ApiError>;

    async fn visitor_additional_guests(
        &self,
        visitor_rsvp_ids: &[String],
    ) -> Result<Vec<VisitorAdditionalGuest>, ApiError>;
}

#[async_trait]
pub trait MemberDirectory: Send + Sync {
    async fn member_by_identity(&self, identity_id: &str) -> Result<Option<Member>, ApiError>;

    async fn member_by_id(&self, member_id: &str) -> Result<Option<Member>, ApiError>;

    /// Store the identity id (and chosen email) on the member row
    async fn link_identity(
        &self,
        member_id: &str,
        identity_id: &str,
        email: &str,
    ) -> Result<(), ApiError>;

    async fn save_push_token(&self, identity_id: &str, token: &str) -> Result<(), ApiError>;

    async fn lodge(&self, lodge_id: &str) -> Result<Option<Lodge>, ApiError>;

    /// Lodges the member currently belongs to
    async fn active_lodge_ids(&self, member_id: &str) -> Result<Vec<String>, ApiError>;
}

#[async_trait]
pub trait EventCatalog: Send + Sync {
    async fn event(&self, event_id: &str) -> Result<Option<Event>, ApiError>;

    /// Events in the given lodges dated on or after `from`, soonest first
    async fn upcoming_events(
        &self,
        lodge_ids: &[String],
        from: NaiveDate,
    ) -> Result<Vec<Event>, ApiError>;

    /// Events of every lodge in a province dated on or after `since`,
    /// most recent first, with the owning lodge embedded
    async fn province_events(
        &self,
        provincial_lodge_id: &str,
        since: NaiveDate,
    ) -> Result<Vec<Event>, ApiError>;
}

#[async_trait]
pub trait RsvpBook: Send + Sync {
    async fn rsvp_for(
        &self,
        event_id: &str,
        member_id: &str,
    ) -> Result<Option<MemberRsvp>, ApiError>;

    /// Write a response. The row for the same (event, member) pair is
    /// replaced rather than duplicated.
    async fn upsert_rsvp(&self, rsvp: &NewRsvp) -> Result<MemberRsvp, ApiError>;
}

#[async_trait]
pub trait InvitationLedger: Send + Sync {
    async fn invitation(&self, code: &str) -> Result<Option<InvitationToken>, ApiError>;

    async fn mark_used(&self, invitation_id: &str, at: DateTime<Utc>) -> Result<(), ApiError>;
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, ApiError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<SessionData, ApiError>;

    async fn refresh(&self, refresh_token: &str) -> Result<SessionData, ApiError>;

    /// The identity behind the current token, if any
    async fn current_identity(&self) -> Result<Option<Identity>, ApiError>;

    async fn sign_out(&self) -> Result<(), ApiError>;
}

#[async_trait]
pub trait MeetingSource: Send + Sync {
    /// Published meetings, optionally restricted to one area, by date
    async fn published_meetings(&self, area: Option<&str>)
        -> Result<Vec<ChapterMeeting>, ApiError>;
}
