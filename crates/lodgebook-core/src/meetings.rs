//! Public chapter meetings calendar.
//!
//! Meetings come from a separate, public database. The calendar is a fixed
//! 6-week grid starting on Monday so every month has the same shape.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use tracing::debug;

use crate::error::LodgeResult;
use crate::models::ChapterMeeting;
use crate::store::MeetingSource;

/// Days shown in the month grid (6 weeks)
pub const GRID_DAYS: usize = 42;

/// Which area's meetings to show
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MeetingsFilter {
    #[default]
    All,
    Area(String),
}

impl MeetingsFilter {
    /// "all" (any case) or empty means every area
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            MeetingsFilter::All
        } else {
            MeetingsFilter::Area(s.to_string())
        }
    }

    pub fn as_option(&self) -> Option<&str> {
        match self {
            MeetingsFilter::All => None,
            MeetingsFilter::Area(a) => Some(a.as_str()),
        }
    }

    pub fn matches(&self, meeting: &ChapterMeeting) -> bool {
        match self {
            MeetingsFilter::All => true,
            MeetingsFilter::Area(a) => meeting.in_area(a),
        }
    }
}

/// Fetch published meetings for an area, soonest first
pub async fn load_meetings<S>(source: &S, filter: &MeetingsFilter) -> LodgeResult<Vec<ChapterMeeting>>
where
    S: MeetingSource + ?Sized,
{
    let meetings = source.published_meetings(filter.as_option()).await?;
    debug!(count = meetings.len(), area = ?filter.as_option(), "Loaded chapter meetings");
    Ok(meetings)
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub is_current_month: bool,
    pub is_today: bool,
    pub meetings: Vec<ChapterMeeting>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarMonth {
    pub year: i32,
    pub month: u32,
    pub days: Vec<CalendarDay>,
}

impl CalendarMonth {
    /// Build the grid for `year`/`month`. Meetings outside the grid are
    /// dropped; meetings are filtered with `filter` case-insensitively.
    pub fn build(
        year: i32,
        month: u32,
        today: NaiveDate,
        meetings: &[ChapterMeeting],
        filter: &MeetingsFilter,
    ) -> Option<Self> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let offset = i64::from(first.weekday().num_days_from_monday());
        let start = first - Duration::days(offset);

        let by_date = group_by_date(meetings.iter().filter(|m| filter.matches(m)));

        let days = (0..GRID_DAYS as i64)
            .map(|i| {
                let date = start + Duration::days(i);
                CalendarDay {
                    date,
                    is_current_month: date.month() == month && date.year() == year,
                    is_today: date == today,
                    meetings: by_date.get(&date).cloned().unwrap_or_default(),
                }
            })
            .collect();

        Some(Self { year, month, days })
    }

    /// (year, month) of the previous month
    pub fn previous(&self) -> (i32, u32) {
        if self.month == 1 {
            (self.year - 1, 12)
        } else {
            (self.year, self.month - 1)
        }
    }

    pub fn next(&self) -> (i32, u32) {
        if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        }
    }

    pub fn title(&self) -> String {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .map(|d| d.format("%B %Y").to_string())
            .unwrap_or_default()
    }

    pub fn weeks(&self) -> impl Iterator<Item = &[CalendarDay]> {
        self.days.chunks(7)
    }

    /// Meetings on one day of the grid, for the day-detail view
    pub fn meetings_on(&self, date: NaiveDate) -> &[ChapterMeeting] {
        self.days
            .iter()
            .find(|d| d.date == date)
            .map(|d| d.meetings.as_slice())
            .unwrap_or(&[])
    }
}

pub fn group_by_date<'a>(
    meetings: impl Iterator<Item = &'a ChapterMeeting>,
) -> BTreeMap<NaiveDate, Vec<ChapterMeeting>> {
    let mut by_date: BTreeMap<NaiveDate, Vec<ChapterMeeting>> = BTreeMap::new();
    for meeting in meetings {
        by_date
            .entry(meeting.meeting_date)
            .or_default()
            .push(meeting.clone());
    }
    by_date
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MeetingType;
    use crate::store::memory::{date, event, MemoryStore};

    fn meeting(id: &str, on: &str, area: Option<&str>) -> ChapterMeeting {
        ChapterMeeting {
            id: id.to_string(),
            chapter_name: format!("Chapter {}", id),
            chapter_number: "100".to_string(),
            location_name: "Masonic Centre".to_string(),
            address: String::new(),
            meeting_date: date(on),
            meeting_time: "19:00".to_string(),
            meeting_contact: None,
            meeting_type: MeetingType::Regular,
            published: true,
            area: area.map(str::to_string),
            notes: None,
        }
    }

    #[test]
    fn test_grid_starts_on_monday() {
        // 1 Oct 2026 is a Thursday
        let month = CalendarMonth::build(2026, 10, date("2026-10-18"), &[], &MeetingsFilter::All).unwrap();
        assert_eq!(month.days.len(), GRID_DAYS);
        assert_eq!(month.days[0].date, date("2026-09-28"));
        assert!(!month.days[0].is_current_month);
        assert!(month.days[3].is_current_month);
        assert_eq!(month.days.iter().filter(|d| d.is_today).count(), 1);
        assert_eq!(month.weeks().count(), 6);
        assert_eq!(month.title(), "October 2026");
    }

    #[test]
    fn test_month_starting_on_sunday() {
        // 1 Nov 2026 is a Sunday: six days of October lead in
        let month = CalendarMonth::build(2026, 11, date("2026-10-18"), &[], &MeetingsFilter::All).unwrap();
        assert_eq!(month.days[0].date, date("2026-10-26"));
        assert_eq!(month.days[6].date, date("2026-11-01"));
        assert!(month.days.iter().all(|d| !d.is_today));
    }

    #[test]
    fn test_meetings_bucketed_and_filtered() {
        let meetings = vec![
            meeting("a", "2026-10-05", Some("Brighton")),
            meeting("b", "2026-10-05", Some("Worthing")),
            meeting("c", "2026-10-21", Some("brighton")),
            meeting("far", "2027-03-01", Some("Brighton")),
        ];
        let filter = MeetingsFilter::parse("BRIGHTON");
        let month = CalendarMonth::build(2026, 10, date("2026-10-18"), &meetings, &filter).unwrap();

        let on_fifth: Vec<&str> = month
            .meetings_on(date("2026-10-05"))
            .iter()
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(on_fifth, vec!["a"]);
        assert_eq!(month.meetings_on(date("2026-10-21")).len(), 1);
        assert!(month.meetings_on(date("2027-03-01")).is_empty());

        let all = CalendarMonth::build(2026, 10, date("2026-10-18"), &meetings, &MeetingsFilter::All).unwrap();
        assert_eq!(all.meetings_on(date("2026-10-05")).len(), 2);
    }

    #[test]
    fn test_navigation_wraps_years() {
        let jan = CalendarMonth::build(2027, 1, date("2026-10-18"), &[], &MeetingsFilter::All).unwrap();
        assert_eq!(jan.previous(), (2026, 12));
        let dec = CalendarMonth::build(2026, 12, date("2026-10-18"), &[], &MeetingsFilter::All).unwrap();
        assert_eq!(dec.next(), (2027, 1));
        assert!(CalendarMonth::build(2026, 13, date("2026-10-18"), &[], &MeetingsFilter::All).is_none());
    }

    #[test]
    fn test_area_filter_parse() {
        assert_eq!(MeetingsFilter::parse("all"), MeetingsFilter::All);
        assert_eq!(MeetingsFilter::parse(" "), MeetingsFilter::All);
        assert_eq!(MeetingsFilter::parse("1066").as_option(), Some("1066"));
    }

    #[test]
    fn test_lodge_events_on_calendar() {
        let e = event("e1", "l1", "2026-10-22", 20.0);
        let as_meeting = ChapterMeeting::from(&e);
        let month = CalendarMonth::build(2026, 10, date("2026-10-18"), &[as_meeting], &MeetingsFilter::All).unwrap();
        assert_eq!(month.meetings_on(date("2026-10-22"))[0].chapter_name, "Meeting e1");
    }

    #[tokio::test]
    async fn test_load_meetings_only_published() {
        let store = MemoryStore::new();
        let mut draft = meeting("draft", "2026-10-10", Some("Brighton"));
        draft.published = false;
        *store.meetings.lock().unwrap() = vec![
            meeting("late", "2026-12-01", Some("Brighton")),
            draft,
            meeting("early", "2026-10-01", Some("Brighton")),
            meeting("other", "2026-10-02", Some("Crawley")),
        ];

        let brighton = load_meetings(&store, &MeetingsFilter::parse("Brighton")).await.unwrap();
        let ids: Vec<&str> = brighton.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);

        let all = load_meetings(&store, &MeetingsFilter::All).await.unwrap();
        assert_eq!(all.len(), 3);
    }
}
