//! Saved stencil works.
//!
//! The store is a key-value port holding one JSON array of [`StencilWork`]
//! records, newest first, capped at [`MAX_WORKS`]. Read failures and corrupt
//! data degrade to an empty list; write failures are logged and ignored.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Local, TimeZone};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PersistenceError;
use crate::styles::ColorStyle;
use crate::{log_info, log_warn};

pub const STORE_KEY: &str = "stencil_works";
pub const MAX_WORKS: usize = 50;

/// One completed generation. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StencilWork {
    pub id: String,
    /// Data URI of the uploaded photo.
    pub original_image: String,
    /// Data URI of the generated stencil.
    pub stencil_image: String,
    /// Unix milliseconds.
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

impl StencilWork {
    pub fn new(original_image: String, stencil_image: String, style: ColorStyle, created_at: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            original_image,
            stencil_image,
            created_at,
            style: Some(style.id().to_string()),
        }
    }

    /// Style tag, falling back to black lines for records saved without one.
    pub fn color_style(&self) -> ColorStyle {
        self.style
            .as_deref()
            .and_then(ColorStyle::from_id)
            .unwrap_or_default()
    }
}

/// Persistence port.
pub trait WorkStore: Send {
    /// Raw stored list. Missing data is `Ok(vec![])`.
    fn load(&self) -> Result<Vec<StencilWork>, PersistenceError>;
    fn save(&mut self, works: &[StencilWork]) -> Result<(), PersistenceError>;
}

/// Load, treating any failure as an empty list.
pub fn load_or_empty(store: &dyn WorkStore) -> Vec<StencilWork> {
    match store.load() {
        Ok(works) => works,
        Err(e) => {
            log_warn!("Saved works unreadable, starting empty: {}", e);
            Vec::new()
        }
    }
}

/// Prepend `work`, cap the list, and write it back. Returns the new list even
/// when the write fails.
pub fn record(store: &mut dyn WorkStore, work: StencilWork) -> Vec<StencilWork> {
    let mut works = load_or_empty(store);
    works.insert(0, work);
    works.truncate(MAX_WORKS);
    match store.save(&works) {
        Ok(()) => {
            log_info!("Saved work ({} stored)", works.len());
        }
        Err(e) => {
            log_warn!("Could not persist work: {}", e);
        }
    }
    works
}

// ============================================================================
// JSON FILE STORE
// ============================================================================

/// `{dir}/{key}.json` on disk.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: &Path, key: &str) -> Self {
        Self {
            path: dir.join(format!("{}.json", key)),
        }
    }

    /// Default location next to the settings file.
    pub fn open_default() -> Option<Self> {
        let dir = crate::settings::config_dir()?;
        Some(Self::new(&dir, STORE_KEY))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WorkStore for JsonFileStore {
    fn load(&self) -> Result<Vec<StencilWork>, PersistenceError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&text)?)
    }

    fn save(&mut self, works: &[StencilWork]) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string(works)?;
        // Write-then-rename so a crash never leaves a half-written list.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// Holds the serialized JSON text in memory, the way a browser key-value store would.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    raw: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw(raw: &str) -> Self {
        Self {
            raw: Some(raw.to_string()),
        }
    }

    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }
}

impl WorkStore for MemoryStore {
    fn load(&self) -> Result<Vec<StencilWork>, PersistenceError> {
        match &self.raw {
            Some(text) => Ok(serde_json::from_str(text)?),
            None => Ok(Vec::new()),
        }
    }

    fn save(&mut self, works: &[StencilWork]) -> Result<(), PersistenceError> {
        self.raw = Some(serde_json::to_string(works)?);
        Ok(())
    }
}

// ============================================================================
// BROWSING
// ============================================================================

/// Works created on the same calendar day, newest first.
#[derive(Clone, Debug, PartialEq)]
pub struct DayGroup {
    /// e.g. "11 de October, 2025"
    pub key: String,
    pub works: Vec<StencilWork>,
}

const MONTHS: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

fn local_time<Tz: TimeZone>(millis: i64, tz: &Tz) -> Option<DateTime<Tz>> {
    tz.timestamp_millis_opt(millis).single()
}

/// Short numeric date used for searching, e.g. "11/10/2025".
pub fn date_label<Tz: TimeZone>(millis: i64, tz: &Tz) -> String {
    match local_time(millis, tz) {
        Some(dt) => format!("{}/{}/{}", dt.day(), dt.month(), dt.year()),
        None => String::new(),
    }
}

pub fn day_key<Tz: TimeZone>(millis: i64, tz: &Tz) -> String {
    match local_time(millis, tz) {
        Some(dt) => format!("{} de {}, {}", dt.day(), MONTHS[dt.month0() as usize], dt.year()),
        None => "Unknown date".to_string(),
    }
}

/// Case-insensitive match against the date label or the style tag. An empty
/// query keeps everything.
pub fn search_in<Tz: TimeZone>(works: &[StencilWork], query: &str, tz: &Tz) -> Vec<StencilWork> {
    let query = query.trim().to_lowercase();
    works
        .iter()
        .filter(|w| {
            query.is_empty()
                || date_label(w.created_at, tz).to_lowercase().contains(&query)
                || w.style
                    .as_deref()
                    .is_some_and(|s| s.to_lowercase().contains(&query))
        })
        .cloned()
        .collect()
}

pub fn search(works: &[StencilWork], query: &str) -> Vec<StencilWork> {
    search_in(works, query, &Local)
}

/// Sort newest first and bucket by calendar day.
pub fn group_by_day_in<Tz: TimeZone>(works: &[StencilWork], tz: &Tz) -> Vec<DayGroup> {
    let mut sorted = works.to_vec();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let mut groups: Vec<DayGroup> = Vec::new();
    for work in sorted {
        let key = day_key(work.created_at, tz);
        match groups.iter_mut().find(|g| g.key == key) {
            Some(group) => group.works.push(work),
            None => groups.push(DayGroup {
                key,
                works: vec![work],
            }),
        }
    }
    groups
}

pub fn group_by_day(works: &[StencilWork]) -> Vec<DayGroup> {
    group_by_day_in(works, &Local)
}
