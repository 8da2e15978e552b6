use crate::view_model::StatusSnapshot;
use crate::{Accumulator, ExtractionMode, Item, JobSnapshot, Settings};

pub type RunId = u64;

pub const READY_MESSAGE: &str = "Ready";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Running,
}

/// Why a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The page stopped growing.
    Finished,
    /// A stop request was observed at a tick boundary.
    StoppedByUser,
    /// A tick failed; treated like a stop.
    Failed(String),
}

impl Termination {
    pub fn message(&self) -> String {
        match self {
            Termination::Finished => "Collection finished.".to_string(),
            Termination::StoppedByUser => "Collection stopped by user.".to_string(),
            Termination::Failed(reason) => format!("Collection interrupted: {reason}"),
        }
    }
}

/// The collection engine's only state container.
///
/// Owned by one task; observers get [`StatusSnapshot`] copies through [`CollectorState::view`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorState {
    session: SessionState,
    run: RunId,
    target: Option<String>,
    username: Option<String>,
    accumulator: Accumulator,
    stop_requested: bool,
    message: String,
    settings: Settings,
    run_auto_scroll: bool,
    ticks: u64,
    last_mode: Option<ExtractionMode>,
}

impl Default for CollectorState {
    fn default() -> Self {
        Self {
            session: SessionState::Idle,
            run: 0,
            target: None,
            username: None,
            accumulator: Accumulator::new(),
            stop_requested: false,
            message: READY_MESSAGE.to_string(),
            settings: Settings::default(),
            run_auto_scroll: true,
            ticks: 0,
            last_mode: None,
        }
    }
}

impl CollectorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn view(&self) -> StatusSnapshot {
        StatusSnapshot {
            is_running: self.is_running(),
            message: self.message.clone(),
            count: self.accumulator.len(),
            current_target: self.target.clone(),
            current_username: self.username.clone(),
            stop_requested: self.stop_requested,
            ticks: self.ticks,
            last_mode: self.last_mode,
        }
    }

    pub fn session(&self) -> SessionState {
        self.session
    }

    pub fn is_running(&self) -> bool {
        self.session == SessionState::Running
    }

    pub fn run(&self) -> RunId {
        self.run
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    /// Scroll option captured when the current run started.
    pub fn run_auto_scroll(&self) -> bool {
        self.run_auto_scroll
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn items(&self) -> &[Item] {
        self.accumulator.items()
    }

    pub(crate) fn is_current_run(&self, run: RunId) -> bool {
        self.is_running() && self.run == run
    }

    /// Enters `Running` with a fresh accumulator; returns the new run id.
    pub(crate) fn begin_run(&mut self, target: String, username: String) -> RunId {
        self.run += 1;
        self.session = SessionState::Running;
        self.stop_requested = false;
        self.run_auto_scroll = self.settings.auto_scroll;
        self.accumulator.clear();
        self.ticks = 0;
        self.last_mode = None;
        self.message = format!("Collecting posts from @{username}...");
        self.target = Some(target);
        self.username = Some(username);
        self.run
    }

    pub(crate) fn request_stop(&mut self) {
        self.stop_requested = true;
        self.message = "Stopping after the current tick...".to_string();
    }

    pub(crate) fn record_tick(&mut self, items: Vec<Item>, mode: ExtractionMode) -> usize {
        self.ticks += 1;
        self.last_mode = Some(mode);
        let added = self.accumulator.merge(items);
        self.message = format!("Collected {} posts...", self.accumulator.len());
        added
    }

    /// Leaves `Running`, returning the job built from the accumulator (if any)
    /// and the resolved termination cause.
    ///
    /// An explicit stop request outranks the natural cause.
    pub(crate) fn end_run(&mut self, cause: Termination) -> (Termination, Option<JobSnapshot>) {
        let cause = if self.stop_requested && cause == Termination::Finished {
            Termination::StoppedByUser
        } else {
            cause
        };
        let job = if self.accumulator.is_empty() {
            None
        } else {
            Some(JobSnapshot {
                username: self
                    .username
                    .clone()
                    .unwrap_or_else(|| crate::UNKNOWN_USERNAME.to_string()),
                items: self.accumulator.items().to_vec(),
            })
        };
        self.session = SessionState::Idle;
        self.stop_requested = false;
        self.message = cause.message();
        (cause, job)
    }

    pub(crate) fn set_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }

    pub(crate) fn set_message(&mut self, message: String) {
        self.message = message;
    }
}
