use chrono::{Duration, NaiveDate};
use tracing::{info, warn};

use crate::auth::Session;
use crate::error::{LodgeError, LodgeResult};
use crate::store::{AttendanceSource, EventCatalog, MemberDirectory};

use super::aggregator::aggregate;
use super::rollup::AttendanceRollup;

/// Window of event dates included in province analytics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalyticsRange {
    Last30Days,
    #[default]
    Last90Days,
    LastYear,
    All,
}

impl AnalyticsRange {
    /// Earliest event date included
    pub fn start_date(&self, today: NaiveDate) -> NaiveDate {
        match self {
            AnalyticsRange::Last30Days => today - Duration::days(30),
            AnalyticsRange::Last90Days => today - Duration::days(90),
            AnalyticsRange::LastYear => today - Duration::days(365),
            AnalyticsRange::All => NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or(NaiveDate::MIN),
        }
    }

    /// Accepts "30", "90", "365" and "all"
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "30" => Some(AnalyticsRange::Last30Days),
            "90" => Some(AnalyticsRange::Last90Days),
            "365" => Some(AnalyticsRange::LastYear),
            "all" => Some(AnalyticsRange::All),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AnalyticsRange::Last30Days => "Last 30 days",
            AnalyticsRange::Last90Days => "Last 90 days",
            AnalyticsRange::LastYear => "Last year",
            AnalyticsRange::All => "All time",
        }
    }
}

/// Attendance analytics for every lodge in the signed-in member's province.
///
/// The province is found through the member's primary lodge. A member with
/// no primary lodge, or a lodge with no province, is reported as missing
/// data rather than an empty rollup.
pub async fn provincial_analytics<S>(
    store: &S,
    session: &Session,
    range: AnalyticsRange,
    today: NaiveDate,
) -> LodgeResult<AttendanceRollup>
where
    S: AttendanceSource + EventCatalog + MemberDirectory + ?Sized,
{
    let member = session.member().ok_or(LodgeError::NotSignedIn)?;

    let lodge_id = member
        .primary_lodge_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| LodgeError::MissingData("No primary lodge found for user".into()))?;

    let province_id = store
        .lodge(lodge_id)
        .await?
        .and_then(|lodge| lodge.provincial_lodge_id)
        .ok_or_else(|| {
            warn!(lodge_id = lodge_id, "Primary lodge has no province");
            LodgeError::MissingData("No provincial lodge found".into())
        })?;

    let since = range.start_date(today);
    let events = store.province_events(&province_id, since).await?;
    info!(
        province = %province_id,
        since = %since,
        events = events.len(),
        "Loaded province events"
    );

    aggregate(store, &events, today).await
}
