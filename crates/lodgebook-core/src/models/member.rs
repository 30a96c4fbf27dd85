use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, deserialize_with = "super::null_as_empty")]
    pub email: String,
    #[serde(default)]
    pub masonic_rank: Option<String>,
    #[serde(default)]
    pub primary_lodge_id: Option<String>,
    #[serde(default)]
    pub push_token: Option<String>,
    #[serde(default)]
    pub auth_user_id: Option<String>,
}

impl Member {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Greeting form used across the app, e.g. "W.Bro. Smith"
    pub fn salutation(&self) -> String {
        let rank = self
            .masonic_rank
            .as_deref()
            .filter(|r| !r.is_empty())
            .unwrap_or("Brother");
        format!("{} {}", rank, self.last_name)
    }

    pub fn has_account(&self) -> bool {
        self.auth_user_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LodgeMembership {
    pub craft_lodge_id: String,
}
