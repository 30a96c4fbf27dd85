//! Member responses to lodge events.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::{LodgeError, LodgeResult};
use crate::models::{Event, MemberRsvp, NewRsvp, RsvpStatus};
use crate::store::{EventCatalog, RsvpBook};

/// Record a member's response to an event.
///
/// The write is an upsert on (event, member), so the pair never has more
/// than one row even when two first responses race. Re-sending the current
/// status leaves the row untouched.
pub async fn respond<B>(
    book: &B,
    member_id: &str,
    event_id: &str,
    status: RsvpStatus,
    now: DateTime<Utc>,
) -> LodgeResult<MemberRsvp>
where
    B: RsvpBook + ?Sized,
{
    let rsvp = match book.rsvp_for(event_id, member_id).await? {
        Some(existing) if existing.status == status => existing,
        _ => {
            book.upsert_rsvp(&NewRsvp {
                event_id: event_id.to_string(),
                member_id: member_id.to_string(),
                status,
                responded_at: now,
            })
            .await?
        }
    };

    info!(event_id = event_id, member_id = member_id, status = %status, "RSVP recorded");
    Ok(rsvp)
}

/// An event with the member's current response, for the detail view
#[derive(Debug, Clone)]
pub struct EventResponse {
    pub event: Event,
    pub rsvp: Option<MemberRsvp>,
}

impl EventResponse {
    pub fn status(&self) -> Option<RsvpStatus> {
        self.rsvp.as_ref().map(|r| r.status)
    }
}

pub async fn event_with_response<S>(store: &S, event_id: &str, member_id: &str) -> LodgeResult<EventResponse>
where
    S: EventCatalog + RsvpBook + ?Sized,
{
    let (event, rsvp) = futures::try_join!(
        store.event(event_id),
        store.rsvp_for(event_id, member_id),
    )?;
    let event = event.ok_or_else(|| LodgeError::MissingData("Event not found".into()))?;
    Ok(EventResponse { event, rsvp })
}
