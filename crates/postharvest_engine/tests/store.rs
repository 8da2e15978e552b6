use std::fs;
use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use postharvest_core::{Item, JobSnapshot, Settings};
use postharvest_engine::{
    Clock, DirStorage, EngineEvent, EventSink, JobStore, StateStorage, StoreError,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingSink {
    fn history_sizes(&self) -> Vec<usize> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                EngineEvent::HistoryUpdate(history) => Some(history.len()),
                EngineEvent::StatusUpdate(_) => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn fixed_clock() -> Clock {
    Arc::new(|| Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
}

fn item(code: &str) -> Item {
    Item::bare(
        format!("https://www.instagram.com/p/{code}/"),
        "u1",
        "2024-05-01T12:00:00.000Z",
    )
}

fn store_in(dir: &TempDir) -> (JobStore, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let store = JobStore::new(
        Arc::new(DirStorage::new(dir.path())),
        sink.clone(),
        fixed_clock(),
    );
    (store, sink)
}

#[test]
fn commit_prepends_and_ids_strictly_increase() {
    let dir = TempDir::new().unwrap();
    let (mut store, sink) = store_in(&dir);

    let first = store.commit("u1", vec![item("A")]).unwrap();
    let second = store.commit("u1", vec![item("B"), item("C")]).unwrap();

    assert!(second.id > first.id);
    assert_eq!(first.date, "2024-05-01T12:00:00.000Z");
    assert_eq!(second.count, 2);

    let history = store.history().unwrap();
    assert_eq!(
        history.iter().map(|r| r.id).collect::<Vec<_>>(),
        vec![second.id, first.id]
    );
    assert_eq!(sink.history_sizes(), vec![1, 2]);
}

#[test]
fn commit_drops_duplicate_urls() {
    let dir = TempDir::new().unwrap();
    let (mut store, _sink) = store_in(&dir);

    let record = store
        .commit("u1", vec![item("A"), item("A"), item("B")])
        .unwrap();

    assert_eq!(record.count, 2);
    assert_eq!(record.items, vec![item("A"), item("B")]);
}

#[test]
fn history_survives_a_new_store_instance() {
    let dir = TempDir::new().unwrap();
    let (mut store, _sink) = store_in(&dir);
    let record = store.commit("u1", vec![item("A")]).unwrap();

    let (reopened, _sink) = store_in(&dir);
    assert_eq!(reopened.fetch(record.id).unwrap(), Some(record));
}

#[test]
fn clear_all_makes_prior_ids_unfetchable() {
    let dir = TempDir::new().unwrap();
    let (mut store, sink) = store_in(&dir);
    let record = store.commit("u1", vec![item("A")]).unwrap();

    store.clear_all().unwrap();

    assert_eq!(store.fetch(record.id).unwrap(), None);
    assert!(store.history().unwrap().is_empty());
    assert_eq!(sink.history_sizes(), vec![1, 0]);
}

#[test]
fn commit_pending_empties_the_slot() {
    let dir = TempDir::new().unwrap();
    let (mut store, _sink) = store_in(&dir);

    assert_eq!(store.commit_pending().unwrap(), None);

    store.stash(JobSnapshot {
        username: "u1".to_string(),
        items: vec![item("A")],
    });
    let record = store.commit_pending().unwrap().expect("pending job committed");
    assert_eq!(record.count, 1);
    assert_eq!(store.pending(), None);
    assert_eq!(store.commit_pending().unwrap(), None);
}

#[test]
fn failed_commit_pending_keeps_the_job() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("state");
    fs::write(&blocker, "not a directory").unwrap();

    let sink = Arc::new(RecordingSink::default());
    let mut store = JobStore::new(
        Arc::new(DirStorage::new(&blocker)),
        sink.clone(),
        fixed_clock(),
    );
    let job = JobSnapshot {
        username: "u1".to_string(),
        items: vec![item("A")],
    };
    store.stash(job.clone());

    assert!(store.commit_pending().is_err());
    assert_eq!(store.pending(), Some(&job));
    assert!(sink.history_sizes().is_empty());
}

#[test]
fn corrupt_history_is_reported() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("history.json"), "{ not json").unwrap();
    let (store, _sink) = store_in(&dir);

    assert!(matches!(
        store.history(),
        Err(StoreError::Corrupt { ref key, .. }) if key == "history"
    ));
}

#[test]
fn legacy_link_only_records_still_load() {
    let dir = TempDir::new().unwrap();
    let legacy = r#"[{"id": 7, "date": "2023-01-01T00:00:00.000Z", "username": "old",
        "count": 2, "links": ["https://www.instagram.com/p/L1/", "https://www.instagram.com/p/L2/"]}]"#;
    fs::write(dir.path().join("history.json"), legacy).unwrap();
    let (store, _sink) = store_in(&dir);

    let record = store.fetch(7).unwrap().expect("legacy record");
    assert!(!record.has_item_metadata());
    assert_eq!(
        record.link_list(),
        vec![
            "https://www.instagram.com/p/L1/".to_string(),
            "https://www.instagram.com/p/L2/".to_string(),
        ]
    );
}

#[test]
fn settings_default_when_missing_or_unreadable() {
    let dir = TempDir::new().unwrap();
    let (store, _sink) = store_in(&dir);
    assert_eq!(store.load_settings(), Settings::default());

    store
        .save_settings(Settings { auto_scroll: false })
        .unwrap();
    assert_eq!(store.load_settings(), Settings { auto_scroll: false });

    DirStorage::new(dir.path())
        .save("settings", "garbage")
        .unwrap();
    assert_eq!(store.load_settings(), Settings::default());
}
