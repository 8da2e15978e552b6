use serde::Serialize;

use crate::ExtractionMode;

/// Read-only copy of the collector state handed to observers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub is_running: bool,
    pub message: String,
    pub count: usize,
    pub current_target: Option<String>,
    pub current_username: Option<String>,
    pub stop_requested: bool,
    pub ticks: u64,
    pub last_mode: Option<ExtractionMode>,
}
