//! Navigation menu and its expanded/collapsed state.
//!
//! The menu layout is static. Which groups are open is a small view-model
//! that survives restarts through whatever `KeyValueStorage` the caller
//! hands in.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::debug;

/// Storage key for the expanded group labels
const EXPANDED_KEY: &str = "expanded_menus";

/// File name used by `FileStorage::in_dir`
const STORAGE_FILE: &str = "ui_state.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuLink {
    pub label: &'static str,
    pub path: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuItem {
    Link(MenuLink),
    Group {
        label: &'static str,
        children: &'static [MenuLink],
    },
}

impl MenuItem {
    pub fn label(&self) -> &'static str {
        match self {
            MenuItem::Link(link) => link.label,
            MenuItem::Group { label, .. } => label,
        }
    }
}

pub const MENU: &[MenuItem] = &[
    MenuItem::Group {
        label: "Meetings",
        children: &[
            MenuLink {
                label: "My Booked Meetings",
                path: "/my-meetings",
            },
            MenuLink {
                label: "Find a Meeting",
                path: "/events",
            },
        ],
    },
    MenuItem::Group {
        label: "Meeting Assistance",
        children: &[
            MenuLink {
                label: "Toast Lists",
                path: "/toast-lists",
            },
            MenuLink {
                label: "Lodge Music",
                path: "/lodge-music",
            },
        ],
    },
    MenuItem::Link(MenuLink {
        label: "Profile",
        path: "/profile",
    }),
];

/// Whether `label` names a collapsible group
pub fn is_group(label: &str) -> bool {
    MENU.iter()
        .any(|item| matches!(item, MenuItem::Group { .. }) && item.label() == label)
}

/// One rendered line of the menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuRow {
    Group { label: &'static str, expanded: bool },
    /// `depth` is 1 under a group, 0 at the top level
    Link { depth: usize, link: &'static MenuLink },
}

// ============================================================================
// Storage
// ============================================================================

/// String key/value persistence for small bits of UI state
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// A JSON object on disk, rewritten on every `set`
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(STORAGE_FILE))
    }

    fn read_all(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", self.path.display()))
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut all = self.read_all()?;
        all.insert(key.to_string(), value.to_string());
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&all)?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self
            .values
            .lock()
            .map_err(|_| anyhow::anyhow!("storage lock poisoned"))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .map_err(|_| anyhow::anyhow!("storage lock poisoned"))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ============================================================================
// Menu state
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MenuState {
    expanded: BTreeSet<String>,
}

impl MenuState {
    /// Restore from storage. Missing or unreadable state starts collapsed.
    pub fn load(storage: &dyn KeyValueStorage) -> Self {
        let expanded = match storage.get(EXPANDED_KEY) {
            Ok(Some(raw)) => serde_json::from_str::<Vec<String>>(&raw).unwrap_or_else(|e| {
                debug!(error = %e, "Ignoring malformed menu state");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                debug!(error = %e, "Menu state unavailable");
                Vec::new()
            }
        };
        Self {
            expanded: expanded.into_iter().collect(),
        }
    }

    pub fn save(&self, storage: &dyn KeyValueStorage) -> Result<()> {
        let labels: Vec<&String> = self.expanded.iter().collect();
        storage.set(EXPANDED_KEY, &serde_json::to_string(&labels)?)
    }

    /// Open a closed group or close an open one. Returns the new state.
    pub fn toggle(&mut self, label: &str) -> bool {
        if self.expanded.remove(label) {
            false
        } else {
            self.expanded.insert(label.to_string());
            true
        }
    }

    pub fn is_expanded(&self, label: &str) -> bool {
        self.expanded.contains(label)
    }

    /// Menu lines for the current state: every group header, plus the
    /// children of open groups
    pub fn rows(&self) -> Vec<MenuRow> {
        let mut rows = Vec::new();
        for item in MENU {
            match item {
                MenuItem::Link(link) => rows.push(MenuRow::Link { depth: 0, link }),
                MenuItem::Group { label, children } => {
                    let expanded = self.is_expanded(label);
                    rows.push(MenuRow::Group { label, expanded });
                    if expanded {
                        rows.extend(children.iter().map(|link| MenuRow::Link { depth: 1, link }));
                    }
                }
            }
        }
        rows
    }
}
