//! Attendance analytics.
//!
//! Attendance for an event is spread over four tables: member RSVPs,
//! visitor RSVPs, guests of member RSVPs and additional guests of visitor
//! RSVPs. This module fetches those rows for a set of events, joins them in
//! memory and rolls the result up per event, per lodge and overall.

pub mod aggregator;
pub mod provincial;
pub mod rollup;

pub use aggregator::{aggregate, fetch_attendance, tally, AttendanceCounts, AttendanceRecords};
pub use provincial::{provincial_analytics, AnalyticsRange};
pub use rollup::{
    build_rollup, rounded_average, AttendanceRollup, EventAttendance, LodgeRollup,
    RECENT_EVENTS_LIMIT,
};
