use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{lodge_display_name, Event};

use super::aggregator::AttendanceCounts;

/// Number of past events kept in the recent-events list
pub const RECENT_EVENTS_LIMIT: usize = 10;

/// Attendance and revenue for one event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventAttendance {
    pub event_id: String,
    pub title: String,
    pub event_date: NaiveDate,
    pub venue: String,
    pub lodge_name: String,
    pub lodge_number: String,
    pub cost_per_person: f64,
    pub counts: AttendanceCounts,
    pub attending: u32,
    pub total_responses: u32,
    /// Zero unless the event is in the past
    pub revenue: f64,
    pub is_past: bool,
}

/// Events and attendance summed per lodge
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LodgeRollup {
    pub lodge_id: String,
    pub lodge_name: String,
    pub lodge_number: String,
    pub event_count: u32,
    pub total_attending: u32,
    pub avg_attendance: u32,
}

impl LodgeRollup {
    pub fn display_name(&self) -> String {
        lodge_display_name(&self.lodge_name, &self.lodge_number)
    }

    fn recompute_average(&mut self) {
        self.avg_attendance = rounded_average(self.total_attending, self.event_count);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttendanceRollup {
    pub total_events: u32,
    pub past_events: u32,
    pub upcoming_events: u32,
    pub total_responses: u32,
    pub total_attending: u32,
    pub total_not_attending: u32,
    pub total_pending: u32,
    /// Attendance across every event, divided by the number of past events
    pub average_attendance: u32,
    pub total_revenue: f64,
    /// Every event in input order
    pub events: Vec<EventAttendance>,
    /// Descending event count
    pub lodge_breakdown: Vec<LodgeRollup>,
    /// Past events, most recent first, at most `RECENT_EVENTS_LIMIT`
    pub recent_events: Vec<EventAttendance>,
}

/// `round(total / count)`, or 0 for no events
pub fn rounded_average(total: u32, count: u32) -> u32 {
    if count == 0 {
        0
    } else {
        (f64::from(total) / f64::from(count)).round() as u32
    }
}

/// Roll per-event counts up into event, lodge and overall totals.
///
/// Revenue only accrues for events dated strictly before `today`. Lodges
/// appear only when at least one of their events is in `events`.
pub fn build_rollup(
    events: &[Event],
    counts: &HashMap<String, AttendanceCounts>,
    today: NaiveDate,
) -> AttendanceRollup {
    let mut rollup = AttendanceRollup::default();
    let mut lodge_order: Vec<String> = Vec::new();
    let mut lodges: HashMap<String, LodgeRollup> = HashMap::new();

    for event in events {
        let c = counts.get(&event.id).copied().unwrap_or_default();
        let attendance = c.total_attendance();
        let is_past = event.is_past(today);
        let revenue = if is_past {
            f64::from(attendance) * event.cost()
        } else {
            0.0
        };

        rollup.total_events += 1;
        rollup.total_responses += c.total_responses();
        rollup.total_attending += attendance;
        rollup.total_not_attending += c.not_attending;
        rollup.total_pending += c.pending;
        rollup.total_revenue += revenue;
        if is_past {
            rollup.past_events += 1;
        } else {
            rollup.upcoming_events += 1;
        }

        let (lodge_name, lodge_number) = match &event.lodge {
            Some(lodge) => (lodge.name.clone(), lodge.number.clone()),
            None => ("Unknown".to_string(), String::new()),
        };

        if let Some(lodge) = &event.lodge {
            let entry = lodges.entry(event.lodge_id.clone()).or_insert_with(|| {
                lodge_order.push(event.lodge_id.clone());
                LodgeRollup {
                    lodge_id: event.lodge_id.clone(),
                    lodge_name: lodge.name.clone(),
                    lodge_number: lodge.number.clone(),
                    event_count: 0,
                    total_attending: 0,
                    avg_attendance: 0,
                }
            });
            entry.event_count += 1;
            entry.total_attending += attendance;
        }

        rollup.events.push(EventAttendance {
            event_id: event.id.clone(),
            title: event.title.clone(),
            event_date: event.event_date,
            venue: event.venue_display().to_string(),
            lodge_name,
            lodge_number,
            cost_per_person: event.cost(),
            counts: c,
            attending: attendance,
            total_responses: c.total_responses(),
            revenue,
            is_past,
        });
    }

    rollup.average_attendance = rounded_average(rollup.total_attending, rollup.past_events);

    let mut breakdown: Vec<LodgeRollup> = lodge_order
        .iter()
        .filter_map(|id| lodges.remove(id))
        .map(|mut lodge| {
            lodge.recompute_average();
            lodge
        })
        .collect();
    // Stable: ties keep first-seen order
    breakdown.sort_by(|a, b| b.event_count.cmp(&a.event_count));
    rollup.lodge_breakdown = breakdown;

    let mut recent: Vec<EventAttendance> =
        rollup.events.iter().filter(|e| e.is_past).cloned().collect();
    recent.sort_by(|a, b| b.event_date.cmp(&a.event_date));
    recent.truncate(RECENT_EVENTS_LIMIT);
    rollup.recent_events = recent;

    rollup
}
