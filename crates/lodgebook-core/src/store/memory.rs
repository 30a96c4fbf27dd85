//! In-memory store used by tests across the crate.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::api::ApiError;
use crate::auth::{Identity, SessionData};
use crate::models::{
    ChapterMeeting, Event, Guest, InvitationToken, Lodge, Member, MemberRsvp, NewRsvp, RsvpStatus,
    VisitorAdditionalGuest, VisitorRsvp,
};

use super::{
    AttendanceSource, EventCatalog, IdentityProvider, InvitationLedger, MeetingSource,
    MemberDirectory, RsvpBook,
};

#[derive(Default)]
pub(crate) struct MemoryStore {
    pub events: Mutex<Vec<Event>>,
    pub lodges: Mutex<Vec<Lodge>>,
    pub members: Mutex<Vec<Member>>,
    /// (member_id, lodge_id, is_active)
    pub memberships: Mutex<Vec<(String, String, bool)>>,
    pub rsvps: Mutex<Vec<MemberRsvp>>,
    pub visitor_rsvps: Mutex<Vec<VisitorRsvp>>,
    pub guests: Mutex<Vec<Guest>>,
    pub additional_guests: Mutex<Vec<VisitorAdditionalGuest>>,
    pub invitations: Mutex<Vec<InvitationToken>>,
    pub meetings: Mutex<Vec<ChapterMeeting>>,
    /// (identity, password)
    pub users: Mutex<Vec<(Identity, String)>>,
    pub signed_in: Mutex<Option<Identity>>,
    /// Another device consumes the invitation between the read and the
    /// `mark_used` write, at this time
    pub redeemed_elsewhere: Mutex<Option<DateTime<Utc>>>,
    /// Operation name that fails with a server error
    pub fail_on: Mutex<Option<&'static str>>,
    pub calls: Mutex<Vec<&'static str>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, operation: &'static str) {
        *self.fail_on.lock().unwrap() = Some(operation);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn enter(&self, operation: &'static str) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push(operation);
        if *self.fail_on.lock().unwrap() == Some(operation) {
            return Err(ApiError::ServerError(format!("{} unavailable", operation)));
        }
        Ok(())
    }

    fn next_id(prefix: &str, len: usize) -> String {
        format!("{}-{}", prefix, len + 1)
    }
}

#[async_trait]
impl AttendanceSource for MemoryStore {
    async fn member_rsvps(&self, event_ids: &[String]) -> Result<Vec<MemberRsvp>, ApiError> {
        self.enter("member_rsvps")?;
        Ok(self
            .rsvps
            .lock()
            .unwrap()
            .iter()
            .filter(|r| event_ids.contains(&r.event_id))
            .cloned()
            .collect())
    }

    async fn visitor_rsvps(&self, event_ids: &[String]) -> Result<Vec<VisitorRsvp>, ApiError> {
        self.enter("visitor_rsvps")?;
        Ok(self
            .visitor_rsvps
            .lock()
            .unwrap()
            .iter()
            .filter(|v| event_ids.contains(&v.event_id))
            .cloned()
            .collect())
    }

    async fn guests(&self, rsvp_ids: &[String]) -> Result<Vec<Guest>, ApiError> {
        self.enter("guests")?;
        Ok(self
            .guests
            .lock()
            .unwrap()
            .iter()
            .filter(|g| rsvp_ids.contains(&g.rsvp_id))
            .cloned()
            .collect())
    }

    async fn visitor_additional_guests(
        &self,
        visitor_rsvp_ids: &[String],
    ) -> Result<Vec<VisitorAdditionalGuest>, ApiError> {
        self.enter("visitor_additional_guests")?;
        Ok(self
            .additional_guests
            .lock()
            .unwrap()
            .iter()
            .filter(|g| visitor_rsvp_ids.contains(&g.visitor_rsvp_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MemberDirectory for MemoryStore {
    async fn member_by_identity(&self, identity_id: &str) -> Result<Option<Member>, ApiError> {
        self.enter("member_by_identity")?;
        Ok(self
            .members
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.auth_user_id.as_deref() == Some(identity_id))
            .cloned())
    }

    async fn member_by_id(&self, member_id: &str) -> Result<Option<Member>, ApiError> {
        self.enter("member_by_id")?;
        Ok(self
            .members
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.id == member_id)
            .cloned())
    }

    async fn link_identity(
        &self,
        member_id: &str,
        identity_id: &str,
        email: &str,
    ) -> Result<(), ApiError> {
        self.enter("link_identity")?;
        let mut members = self.members.lock().unwrap();
        let member = members
            .iter_mut()
            .find(|m| m.id == member_id)
            .ok_or_else(|| ApiError::NotFound(format!("member {}", member_id)))?;
        member.auth_user_id = Some(identity_id.to_string());
        member.email = email.to_string();
        Ok(())
    }

    async fn save_push_token(&self, identity_id: &str, token: &str) -> Result<(), ApiError> {
        self.enter("save_push_token")?;
        for member in self.members.lock().unwrap().iter_mut() {
            if member.auth_user_id.as_deref() == Some(identity_id) {
                member.push_token = Some(token.to_string());
            }
        }
        Ok(())
    }

    async fn lodge(&self, lodge_id: &str) -> Result<Option<Lodge>, ApiError> {
        self.enter("lodge")?;
        Ok(self
            .lodges
            .lock()
            .unwrap()
            .iter()
            .find(|l| l.id == lodge_id)
            .cloned())
    }

    async fn active_lodge_ids(&self, member_id: &str) -> Result<Vec<String>, ApiError> {
        self.enter("active_lodge_ids")?;
        Ok(self
            .memberships
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _, active)| m == member_id && *active)
            .map(|(_, l, _)| l.clone())
            .collect())
    }
}

#[async_trait]
impl EventCatalog for MemoryStore {
    async fn event(&self, event_id: &str) -> Result<Option<Event>, ApiError> {
        self.enter("event")?;
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == event_id)
            .cloned())
    }

    async fn upcoming_events(
        &self,
        lodge_ids: &[String],
        from: NaiveDate,
    ) -> Result<Vec<Event>, ApiError> {
        self.enter("upcoming_events")?;
        let mut events: Vec<Event> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| lodge_ids.contains(&e.lodge_id) && e.event_date >= from)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.event_date);
        Ok(events)
    }

    async fn province_events(
        &self,
        provincial_lodge_id: &str,
        since: NaiveDate,
    ) -> Result<Vec<Event>, ApiError> {
        self.enter("province_events")?;
        let lodges = self.lodges.lock().unwrap().clone();
        let mut events: Vec<Event> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.event_date >= since)
            .filter_map(|e| {
                let lodge = lodges.iter().find(|l| l.id == e.lodge_id)?;
                if lodge.provincial_lodge_id.as_deref() != Some(provincial_lodge_id) {
                    return None;
                }
                let mut event = e.clone();
                event.lodge = Some(lodge.clone());
                Some(event)
            })
            .collect();
        events.sort_by(|a, b| b.event_date.cmp(&a.event_date));
        Ok(events)
    }
}

#[async_trait]
impl RsvpBook for MemoryStore {
    async fn rsvp_for(
        &self,
        event_id: &str,
        member_id: &str,
    ) -> Result<Option<MemberRsvp>, ApiError> {
        self.enter("rsvp_for")?;
        Ok(self
            .rsvps
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.event_id == event_id && r.member_id == member_id)
            .cloned())
    }

    async fn upsert_rsvp(&self, rsvp: &NewRsvp) -> Result<MemberRsvp, ApiError> {
        self.enter("upsert_rsvp")?;
        let mut rsvps = self.rsvps.lock().unwrap();
        if let Some(row) = rsvps
            .iter_mut()
            .find(|r| r.event_id == rsvp.event_id && r.member_id == rsvp.member_id)
        {
            row.status = rsvp.status;
            row.responded_at = Some(rsvp.responded_at);
            return Ok(row.clone());
        }
        let row = MemberRsvp {
            id: Self::next_id("rsvp", rsvps.len()),
            event_id: rsvp.event_id.clone(),
            member_id: rsvp.member_id.clone(),
            status: rsvp.status,
            responded_at: Some(rsvp.responded_at),
        };
        rsvps.push(row.clone());
        Ok(row)
    }
}

#[async_trait]
impl InvitationLedger for MemoryStore {
    async fn invitation(&self, code: &str) -> Result<Option<InvitationToken>, ApiError> {
        self.enter("invitation")?;
        Ok(self
            .invitations
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.token == code)
            .cloned())
    }

    async fn mark_used(&self, invitation_id: &str, at: DateTime<Utc>) -> Result<(), ApiError> {
        self.enter("mark_used")?;
        let mut invitations = self.invitations.lock().unwrap();
        if let Some(earlier) = self.redeemed_elsewhere.lock().unwrap().take() {
            if let Some(token) = invitations.iter_mut().find(|t| t.id == invitation_id) {
                token.used_at = Some(earlier);
            }
        }
        let token = invitations
            .iter_mut()
            .find(|t| t.id == invitation_id && t.used_at.is_none())
            .ok_or_else(|| ApiError::NotFound(format!("unused invitation {}", invitation_id)))?;
        token.used_at = Some(at);
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for MemoryStore {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, ApiError> {
        self.enter("sign_up")?;
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|(i, _)| i.email.as_deref() == Some(email)) {
            return Err(ApiError::BadRequest("User already registered".into()));
        }
        let identity = Identity {
            id: Self::next_id("uid", users.len()),
            email: Some(email.to_string()),
        };
        users.push((identity.clone(), password.to_string()));
        Ok(identity)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<SessionData, ApiError> {
        self.enter("sign_in")?;
        let identity = self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|(i, p)| i.email.as_deref() == Some(email) && p == password)
            .map(|(i, _)| i.clone())
            .ok_or_else(|| ApiError::BadRequest("Invalid login credentials".into()))?;
        *self.signed_in.lock().unwrap() = Some(identity.clone());
        Ok(SessionData {
            access_token: format!("access-{}", identity.id),
            refresh_token: format!("refresh-{}", identity.id),
            identity,
            expires_at: Utc::now() + Duration::hours(1),
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<SessionData, ApiError> {
        self.enter("refresh")?;
        let identity = self
            .signed_in
            .lock()
            .unwrap()
            .clone()
            .filter(|i| refresh_token == format!("refresh-{}", i.id))
            .ok_or(ApiError::Unauthorized)?;
        Ok(SessionData {
            access_token: format!("access2-{}", identity.id),
            refresh_token: refresh_token.to_string(),
            identity,
            expires_at: Utc::now() + Duration::hours(1),
        })
    }

    async fn current_identity(&self) -> Result<Option<Identity>, ApiError> {
        self.enter("current_identity")?;
        Ok(self.signed_in.lock().unwrap().clone())
    }

    async fn sign_out(&self) -> Result<(), ApiError> {
        self.enter("sign_out")?;
        *self.signed_in.lock().unwrap() = None;
        Ok(())
    }
}

#[async_trait]
impl MeetingSource for MemoryStore {
    async fn published_meetings(
        &self,
        area: Option<&str>,
    ) -> Result<Vec<ChapterMeeting>, ApiError> {
        self.enter("published_meetings")?;
        let mut meetings: Vec<ChapterMeeting> = self
            .meetings
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.published)
            .filter(|m| area.map_or(true, |a| m.area.as_deref() == Some(a)))
            .cloned()
            .collect();
        meetings.sort_by_key(|m| m.meeting_date);
        Ok(meetings)
    }
}

// ============================================================================
// Fixture builders
// ============================================================================

pub(crate) fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub(crate) fn event(id: &str, lodge_id: &str, event_date: &str, cost: f64) -> Event {
    Event {
        id: id.to_string(),
        title: format!("Meeting {}", id),
        description: None,
        event_date: date(event_date),
        event_time: Some("18:30".to_string()),
        venue: Some("Masonic Hall".to_string()),
        rsvp_deadline: None,
        cost_per_person: Some(cost),
        lodge_id: lodge_id.to_string(),
        lodge: None,
    }
}

pub(crate) fn lodge(id: &str, name: &str, number: &str, province: Option<&str>) -> Lodge {
    Lodge {
        id: id.to_string(),
        name: name.to_string(),
        number: number.to_string(),
        provincial_lodge_id: province.map(str::to_string),
    }
}

pub(crate) fn member(id: &str, auth_user_id: Option<&str>, primary_lodge_id: Option<&str>) -> Member {
    Member {
        id: id.to_string(),
        first_name: "John".to_string(),
        last_name: format!("Member{}", id),
        email: format!("{}@example.org", id),
        masonic_rank: Some("Bro.".to_string()),
        primary_lodge_id: primary_lodge_id.map(str::to_string),
        push_token: None,
        auth_user_id: auth_user_id.map(str::to_string),
    }
}

pub(crate) fn rsvp(id: &str, event_id: &str, member_id: &str, status: RsvpStatus) -> MemberRsvp {
    MemberRsvp {
        id: id.to_string(),
        event_id: event_id.to_string(),
        member_id: member_id.to_string(),
        status,
        responded_at: None,
    }
}

pub(crate) fn visitor(id: &str, event_id: &str) -> VisitorRsvp {
    VisitorRsvp {
        id: id.to_string(),
        event_id: event_id.to_string(),
    }
}

pub(crate) fn guest(id: &str, rsvp_id: &str) -> Guest {
    Guest {
        id: id.to_string(),
        rsvp_id: rsvp_id.to_string(),
    }
}

pub(crate) fn additional_guest(id: &str, visitor_rsvp_id: &str) -> VisitorAdditionalGuest {
    VisitorAdditionalGuest {
        id: id.to_string(),
        visitor_rsvp_id: visitor_rsvp_id.to_string(),
    }
}
