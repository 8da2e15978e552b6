use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::SecondsFormat;
use engine_logging::{engine_info, engine_warn};
use postharvest_core::{Item, JobSnapshot, Settings};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Clock;
use crate::persist::{AtomicFileWriter, PersistError};
use crate::sink::EventSink;
use crate::EngineEvent;

pub const HISTORY_KEY: &str = "history";
pub const SETTINGS_KEY: &str = "settings";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage io failed: {0}")]
    Persist(#[from] PersistError),
    #[error("could not serialize {key}: {message}")]
    Serialize { key: String, message: String },
    #[error("stored {key} is unreadable: {message}")]
    Corrupt { key: String, message: String },
}

/// A committed job. Immutable once written.
///
/// Records from older versions may hold only `links`; `items` is then empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: u64,
    pub date: String,
    pub username: String,
    pub count: usize,
    #[serde(default, alias = "posts")]
    pub items: Vec<Item>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<String>,
}

impl HistoryRecord {
    pub fn has_item_metadata(&self) -> bool {
        !self.items.is_empty()
    }

    /// Post links, from items when present, else from the legacy link list.
    pub fn link_list(&self) -> Vec<String> {
        if self.has_item_metadata() {
            self.items.iter().map(|item| item.url.clone()).collect()
        } else {
            self.links.clone()
        }
    }
}

/// Durable key/value state, one opaque string per key.
pub trait StateStorage: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError>;
    /// Replaces the value for `key` all-or-nothing.
    fn save(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Keeps each key as `{dir}/{key}.json`.
#[derive(Debug, Clone)]
pub struct DirStorage {
    writer: AtomicFileWriter,
}

impl DirStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            writer: AtomicFileWriter::new(dir.into()),
        }
    }

    fn filename(key: &str) -> String {
        format!("{key}.json")
    }
}

impl StateStorage for DirStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.writer.read(&Self::filename(key))?)
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.writer.write(&Self::filename(key), value.as_bytes())?;
        Ok(())
    }
}

/// Append-only job history plus the single pending-job slot.
pub struct JobStore {
    storage: Arc<dyn StateStorage>,
    sink: Arc<dyn EventSink>,
    clock: Clock,
    pending: Option<JobSnapshot>,
    last_id: u64,
}

impl JobStore {
    pub fn new(storage: Arc<dyn StateStorage>, sink: Arc<dyn EventSink>, clock: Clock) -> Self {
        Self {
            storage,
            sink,
            clock,
            pending: None,
            last_id: 0,
        }
    }

    /// Full history, most recent first.
    pub fn history(&self) -> Result<Vec<HistoryRecord>, StoreError> {
        match self.storage.load(HISTORY_KEY)? {
            None => Ok(Vec::new()),
            Some(text) => serde_json::from_str(&text).map_err(|err| StoreError::Corrupt {
                key: HISTORY_KEY.to_string(),
                message: err.to_string(),
            }),
        }
    }

    pub fn fetch(&self, id: u64) -> Result<Option<HistoryRecord>, StoreError> {
        Ok(self.history()?.into_iter().find(|record| record.id == id))
    }

    /// Writes a new record at the head of the history and notifies observers.
    /// Nothing is notified if the write fails.
    pub fn commit(&mut self, username: &str, items: Vec<Item>) -> Result<HistoryRecord, StoreError> {
        let mut history = self.history()?;
        let now = (self.clock)();

        let newest = history.iter().map(|r| r.id).max().unwrap_or(0);
        let id = u64::try_from(now.timestamp_millis())
            .unwrap_or(0)
            .max(newest.max(self.last_id) + 1);

        let mut seen = HashSet::new();
        let items: Vec<Item> = items
            .into_iter()
            .filter(|item| seen.insert(item.url.clone()))
            .collect();

        let record = HistoryRecord {
            id,
            date: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            username: username.to_string(),
            count: items.len(),
            items,
            links: Vec::new(),
        };
        history.insert(0, record.clone());
        self.write_history(&history)?;
        self.last_id = id;

        engine_info!(
            "committed job id={} username={} count={}",
            record.id,
            record.username,
            record.count
        );
        self.sink.emit(EngineEvent::HistoryUpdate(history));
        Ok(record)
    }

    pub fn stash(&mut self, job: JobSnapshot) {
        self.pending = Some(job);
    }

    pub fn discard_pending(&mut self) {
        self.pending = None;
    }

    pub fn pending(&self) -> Option<&JobSnapshot> {
        self.pending.as_ref()
    }

    /// Commits the pending job, if any, and empties the slot. On failure the
    /// job stays pending.
    pub fn commit_pending(&mut self) -> Result<Option<HistoryRecord>, StoreError> {
        let Some(job) = self.pending.take() else {
            return Ok(None);
        };
        match self.commit(&job.username, job.items.clone()) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                engine_warn!("pending job for {} kept after failed commit: {}", job.username, err);
                self.pending = Some(job);
                Err(err)
            }
        }
    }

    pub fn clear_all(&mut self) -> Result<(), StoreError> {
        self.write_history(&[])?;
        engine_info!("history cleared");
        self.sink.emit(EngineEvent::HistoryUpdate(Vec::new()));
        Ok(())
    }

    /// Stored settings; missing or unreadable settings fall back to defaults.
    pub fn load_settings(&self) -> Settings {
        let text = match self.storage.load(SETTINGS_KEY) {
            Ok(Some(text)) => text,
            Ok(None) => return Settings::default(),
            Err(err) => {
                engine_warn!("failed to read settings, using defaults: {}", err);
                return Settings::default();
            }
        };
        serde_json::from_str(&text).unwrap_or_else(|err| {
            engine_warn!("failed to parse settings, using defaults: {}", err);
            Settings::default()
        })
    }

    pub fn save_settings(&self, settings: Settings) -> Result<(), StoreError> {
        let text = serde_json::to_string_pretty(&settings).map_err(|err| StoreError::Serialize {
            key: SETTINGS_KEY.to_string(),
            message: err.to_string(),
        })?;
        self.storage.save(SETTINGS_KEY, &text)
    }

    fn write_history(&self, history: &[HistoryRecord]) -> Result<(), StoreError> {
        let text = serde_json::to_string_pretty(history).map_err(|err| StoreError::Serialize {
            key: HISTORY_KEY.to_string(),
            message: err.to_string(),
        })?;
        self.storage.save(HISTORY_KEY, &text)
    }
}
