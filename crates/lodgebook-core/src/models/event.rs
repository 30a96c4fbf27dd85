use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lodge {
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "super::null_as_empty")]
    pub number: String,
    #[serde(default)]
    pub provincial_lodge_id: Option<String>,
}

impl Lodge {
    pub fn display_name(&self) -> String {
        lodge_display_name(&self.name, &self.number)
    }
}

/// "Lodge of Harmony No. 255", or just the name when unnumbered
pub fn lodge_display_name(name: &str, number: &str) -> String {
    if number.is_empty() {
        name.to_string()
    } else {
        format!("{} No. {}", name, number)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub event_date: NaiveDate,
    #[serde(default)]
    pub event_time: Option<String>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub rsvp_deadline: Option<NaiveDate>,
    #[serde(default)]
    pub cost_per_person: Option<f64>,
    pub lodge_id: String,
    // Present when selected with an embedded `craft_lodges(...)` join
    #[serde(rename = "craft_lodges", default, skip_serializing_if = "Option::is_none")]
    pub lodge: Option<Lodge>,
}

impl Event {
    pub fn cost(&self) -> f64 {
        self.cost_per_person.unwrap_or(0.0)
    }

    /// An event is past once its date is strictly before `today`.
    pub fn is_past(&self, today: NaiveDate) -> bool {
        self.event_date < today
    }

    pub fn venue_display(&self) -> &str {
        self.venue.as_deref().unwrap_or("")
    }

    /// Whether responses are still accepted on `today`
    pub fn rsvp_open(&self, today: NaiveDate) -> bool {
        match self.rsvp_deadline {
            Some(deadline) => today <= deadline,
            None => !self.is_past(today),
        }
    }

    pub fn formatted_date(&self) -> String {
        self.event_date.format("%-d %b %Y").to_string()
    }
}
