//! Application configuration.
//!
//! Two layers: `BackendConfig` comes from the environment (the binary loads
//! `.env` first), and `Config` holds user preferences at
//! `~/.config/lodgebook/config.json`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "lodgebook";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const ENV_URL: &str = "LODGEBOOK_SUPABASE_URL";
const ENV_ANON_KEY: &str = "LODGEBOOK_SUPABASE_ANON_KEY";
const ENV_MEETINGS_URL: &str = "LODGEBOOK_MEETINGS_URL";
const ENV_MEETINGS_ANON_KEY: &str = "LODGEBOOK_MEETINGS_ANON_KEY";

/// Where the hosted databases live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
    /// Public meetings database; both url and key must be set
    pub meetings: Option<(String, String)>,
}

impl BackendConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let url = get(ENV_URL).with_context(|| format!("{} is not set", ENV_URL))?;
        let anon_key = get(ENV_ANON_KEY).with_context(|| format!("{} is not set", ENV_ANON_KEY))?;
        let meetings = get(ENV_MEETINGS_URL).zip(get(ENV_MEETINGS_ANON_KEY));

        Ok(Self {
            url,
            anon_key,
            meetings,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    pub last_email: Option<String>,
    pub meetings_area: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Session file, menu state and logs live here
    pub fn cache_dir() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}
