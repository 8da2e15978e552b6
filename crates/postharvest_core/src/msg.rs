use crate::{ExtractionMode, Item, RunId, Settings};

/// Result of one extraction tick, as seen by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickBatch {
    pub items: Vec<Item>,
    pub end_of_page: bool,
    pub mode: ExtractionMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// A start command whose target resolved to `username`.
    StartRequested { target: String, username: String },
    /// User asked the running job to stop at the next tick boundary.
    StopRequested,
    /// An extraction tick finished.
    TickCompleted { run: RunId, batch: TickBatch },
    /// An extraction tick failed or timed out.
    TickFailed { run: RunId, reason: String },
    /// The inter-tick delay elapsed.
    TickDue { run: RunId },
    /// Settings were changed and persisted.
    SettingsUpdated(Settings),
    /// Writing a job to history failed.
    CommitFailed { reason: String },
}
