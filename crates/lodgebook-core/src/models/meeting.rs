use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use url::form_urlencoded::byte_serialize;

use super::Event;

const MAPS_SEARCH_URL: &str = "https://www.google.com/maps/search/";

/// Meeting types, used for colour coding on the calendar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingType {
    #[default]
    Regular,
    Exaltation,
    Installation,
    Special,
}

impl std::fmt::Display for MeetingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MeetingType::Regular => write!(f, "Regular"),
            MeetingType::Exaltation => write!(f, "Exaltation"),
            MeetingType::Installation => write!(f, "Installation"),
            MeetingType::Special => write!(f, "Special"),
        }
    }
}

/// A published chapter meeting from the public meetings database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterMeeting {
    pub id: String,
    pub chapter_name: String,
    #[serde(default, deserialize_with = "super::null_as_empty")]
    pub chapter_number: String,
    #[serde(default, deserialize_with = "super::null_as_empty")]
    pub location_name: String,
    #[serde(default, deserialize_with = "super::null_as_empty")]
    pub address: String,
    pub meeting_date: NaiveDate,
    #[serde(default, deserialize_with = "super::null_as_empty")]
    pub meeting_time: String,
    #[serde(default)]
    pub meeting_contact: Option<String>,
    #[serde(default)]
    pub meeting_type: MeetingType,
    #[serde(default = "default_published")]
    pub published: bool,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_published() -> bool {
    true
}

impl ChapterMeeting {
    pub fn in_area(&self, area: &str) -> bool {
        self.area
            .as_deref()
            .is_some_and(|a| a.eq_ignore_ascii_case(area))
    }

    /// Search link for the meeting location
    pub fn maps_url(&self) -> String {
        let location = if self.address.is_empty() || self.address == self.location_name {
            self.location_name.clone()
        } else {
            format!("{}, {}", self.location_name, self.address)
        };
        let query: String = byte_serialize(location.as_bytes()).collect();
        format!("{}?api=1&query={}", MAPS_SEARCH_URL, query)
    }
}

impl From<&Event> for ChapterMeeting {
    /// Show a lodge event on the same calendar as chapter meetings
    fn from(event: &Event) -> Self {
        let venue = event.venue.clone().unwrap_or_default();
        Self {
            id: event.id.clone(),
            chapter_name: event.title.clone(),
            chapter_number: String::new(),
            location_name: venue.clone(),
            address: venue,
            meeting_date: event.event_date,
            meeting_time: event.event_time.clone().unwrap_or_default(),
            meeting_contact: None,
            meeting_type: MeetingType::Regular,
            published: true,
            area: None,
            notes: event.description.clone(),
        }
    }
}
