//! Attendance aggregation across the four attendance tables.
//!
//! Guests and visitor additional guests carry no event id; they link to an
//! event only through their owning RSVP. The join therefore happens here, in
//! memory, through two reverse indexes (rsvp id → event id and visitor rsvp
//! id → event id).

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::LodgeResult;
use crate::models::{
    Event, Guest, MemberRsvp, RsvpStatus, VisitorAdditionalGuest, VisitorRsvp,
};
use crate::store::AttendanceSource;

use super::rollup::{build_rollup, AttendanceRollup};

/// Per-event counts from every contributing table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceCounts {
    pub attending: u32,
    pub not_attending: u32,
    pub pending: u32,
    pub visitors: u32,
    pub guests: u32,
    pub additional_guests: u32,
}

impl AttendanceCounts {
    /// Everyone expected in the room: members, visitors and both guest tiers
    pub fn total_attendance(&self) -> u32 {
        self.attending + self.visitors + self.guests + self.additional_guests
    }

    /// Member responses of any status
    pub fn total_responses(&self) -> u32 {
        self.attending + self.not_attending + self.pending
    }
}

/// Raw rows fetched for a set of events
#[derive(Debug, Clone, Default)]
pub struct AttendanceRecords {
    pub member_rsvps: Vec<MemberRsvp>,
    pub visitor_rsvps: Vec<VisitorRsvp>,
    pub guests: Vec<Guest>,
    pub additional_guests: Vec<VisitorAdditionalGuest>,
}

/// Fetch every attendance-contributing row for `event_ids`.
///
/// Member and visitor RSVPs are independent of each other, as are the two
/// guest tables, so each pair is fetched concurrently. Any failed fetch
/// fails the whole call.
pub async fn fetch_attendance<S>(source: &S, event_ids: &[String]) -> LodgeResult<AttendanceRecords>
where
    S: AttendanceSource + ?Sized,
{
    if event_ids.is_empty() {
        return Ok(AttendanceRecords::default());
    }

    let (member_rsvps, visitor_rsvps) = futures::try_join!(
        source.member_rsvps(event_ids),
        source.visitor_rsvps(event_ids),
    )?;

    let rsvp_ids: Vec<String> = member_rsvps.iter().map(|r| r.id.clone()).collect();
    let visitor_rsvp_ids: Vec<String> = visitor_rsvps.iter().map(|v| v.id.clone()).collect();

    let (guests, additional_guests) = futures::try_join!(
        source.guests(&rsvp_ids),
        source.visitor_additional_guests(&visitor_rsvp_ids),
    )?;

    debug!(
        events = event_ids.len(),
        member_rsvps = member_rsvps.len(),
        visitor_rsvps = visitor_rsvps.len(),
        guests = guests.len(),
        additional_guests = additional_guests.len(),
        "Fetched attendance records"
    );

    Ok(AttendanceRecords {
        member_rsvps,
        visitor_rsvps,
        guests,
        additional_guests,
    })
}

/// Fold raw rows into per-event counts.
///
/// Events with no rows at all are absent from the map; callers treat a
/// missing entry as all-zero. Guests whose owning RSVP is not among
/// `records` are ignored.
pub fn tally(records: &AttendanceRecords) -> HashMap<String, AttendanceCounts> {
    let mut counts: HashMap<String, AttendanceCounts> = HashMap::new();
    let mut rsvp_to_event: HashMap<&str, &str> = HashMap::new();
    let mut visitor_rsvp_to_event: HashMap<&str, &str> = HashMap::new();

    for rsvp in &records.member_rsvps {
        rsvp_to_event.insert(rsvp.id.as_str(), rsvp.event_id.as_str());
        let entry = counts.entry(rsvp.event_id.clone()).or_default();
        match rsvp.status {
            RsvpStatus::Attending => entry.attending += 1,
            RsvpStatus::NotAttending => entry.not_attending += 1,
            RsvpStatus::Pending => entry.pending += 1,
        }
    }

    for visitor in &records.visitor_rsvps {
        visitor_rsvp_to_event.insert(visitor.id.as_str(), visitor.event_id.as_str());
        counts.entry(visitor.event_id.clone()).or_default().visitors += 1;
    }

    for guest in &records.guests {
        if let Some(event_id) = rsvp_to_event.get(guest.rsvp_id.as_str()) {
            counts.entry(event_id.to_string()).or_default().guests += 1;
        }
    }

    for additional in &records.additional_guests {
        if let Some(event_id) = visitor_rsvp_to_event.get(additional.visitor_rsvp_id.as_str()) {
            counts
                .entry(event_id.to_string())
                .or_default()
                .additional_guests += 1;
        }
    }

    counts
}

/// Fetch, tally and roll up attendance for `events`.
///
/// An empty event list yields an empty rollup without any fetch.
pub async fn aggregate<S>(source: &S, events: &[Event], today: NaiveDate) -> LodgeResult<AttendanceRollup>
where
    S: AttendanceSource + ?Sized,
{
    let event_ids: Vec<String> = events.iter().map(|e| e.id.clone()).collect();
    let records = fetch_attendance(source, &event_ids).await?;
    let counts = tally(&records);
    let rollup = build_rollup(events, &counts, today);

    info!(
        events = rollup.total_events,
        attending = rollup.total_attending,
        lodges = rollup.lodge_breakdown.len(),
        "Aggregated attendance"
    );
    Ok(rollup)
}
