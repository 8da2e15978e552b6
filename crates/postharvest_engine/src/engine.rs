use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use engine_logging::{
    collection_tick, engine_debug, engine_error, engine_info, engine_warn, set_collection_tick,
};
use postharvest_core::{
    update, username_from_location, CollectorState, Effect, Msg, Settings, StatusSnapshot,
};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::config::EngineConfig;
use crate::export::{render, ExportError, ExportFormat, RenderedExport};
use crate::filename::Downloader;
use crate::sink::EventSink;
use crate::store::{HistoryRecord, JobStore, StateStorage, StoreError};
use crate::surface::{Surface, SurfaceProvider};
use crate::tick::{collect_tick, TickOptions};
use crate::{EngineEvent, SurfaceError, SurfaceFailure};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("target unavailable: {0}")]
    TargetUnavailable(#[from] SurfaceError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("engine task is no longer running")]
    EngineGone,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started { username: String },
    /// A job was already running; it is left untouched.
    AlreadyRunning,
}

/// A rendered export and where the downloader put it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReceipt {
    pub rendered: RenderedExport,
    pub path: PathBuf,
}

type Reply<T> = oneshot::Sender<Result<T, EngineError>>;

enum EngineCommand {
    Start { target: String, reply: Reply<StartOutcome> },
    Stop { reply: oneshot::Sender<()> },
    Status { reply: oneshot::Sender<StatusSnapshot> },
    CommitPending { reply: Reply<Option<HistoryRecord>> },
    Export {
        id: u64,
        format: ExportFormat,
        file_name: Option<String>,
        reply: Reply<ExportReceipt>,
    },
    ClearHistory { reply: Reply<()> },
    UpdateSettings { settings: Settings, reply: Reply<()> },
    Settings { reply: oneshot::Sender<Settings> },
    History { reply: Reply<Vec<HistoryRecord>> },
    Fetch { id: u64, reply: Reply<Option<HistoryRecord>> },
}

/// Cloneable handle to the engine task. The task ends once every handle is
/// dropped.
#[derive(Clone)]
pub struct EngineHandle {
    cmd_tx: mpsc::UnboundedSender<EngineCommand>,
}

impl EngineHandle {
    /// Spawns the engine task on the current tokio runtime. Stored settings
    /// are loaded before the first command is served.
    pub fn spawn(
        config: EngineConfig,
        surfaces: Arc<dyn SurfaceProvider>,
        storage: Arc<dyn StateStorage>,
        downloader: Arc<dyn Downloader>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();

        let store = JobStore::new(storage, sink.clone(), config.clock.clone());
        let settings = store.load_settings();
        let actor = EngineActor {
            config,
            surfaces,
            store,
            downloader,
            sink,
            state: CollectorState::with_settings(settings),
            surface: None,
            msg_tx,
        };
        tokio::spawn(actor.run(cmd_rx, msg_rx));

        Self { cmd_tx }
    }

    pub async fn start(&self, target: impl Into<String>) -> Result<StartOutcome, EngineError> {
        let target = target.into();
        self.request(|reply| EngineCommand::Start { target, reply })
            .await?
    }

    /// Asks the running job to end at the next tick boundary. No-op when idle.
    pub async fn stop(&self) -> Result<(), EngineError> {
        self.request(|reply| EngineCommand::Stop { reply }).await
    }

    pub async fn status(&self) -> Result<StatusSnapshot, EngineError> {
        self.request(|reply| EngineCommand::Status { reply }).await
    }

    pub async fn commit_pending(&self) -> Result<Option<HistoryRecord>, EngineError> {
        self.request(|reply| EngineCommand::CommitPending { reply })
            .await?
    }

    /// Renders a history record and hands it to the downloader.
    pub async fn export(
        &self,
        id: u64,
        format: ExportFormat,
        file_name: Option<String>,
    ) -> Result<ExportReceipt, EngineError> {
        self.request(|reply| EngineCommand::Export {
            id,
            format,
            file_name,
            reply,
        })
        .await?
    }

    pub async fn clear_history(&self) -> Result<(), EngineError> {
        self.request(|reply| EngineCommand::ClearHistory { reply })
            .await?
    }

    /// Persists settings; they apply from the next job.
    pub async fn update_settings(&self, settings: Settings) -> Result<(), EngineError> {
        self.request(|reply| EngineCommand::UpdateSettings { settings, reply })
            .await?
    }

    pub async fn settings(&self) -> Result<Settings, EngineError> {
        self.request(|reply| EngineCommand::Settings { reply }).await
    }

    pub async fn history(&self) -> Result<Vec<HistoryRecord>, EngineError> {
        self.request(|reply| EngineCommand::History { reply })
            .await?
    }

    pub async fn fetch(&self, id: u64) -> Result<Option<HistoryRecord>, EngineError> {
        self.request(|reply| EngineCommand::Fetch { id, reply })
            .await?
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> EngineCommand,
    ) -> Result<T, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(build(reply))
            .map_err(|_| EngineError::EngineGone)?;
        rx.await.map_err(|_| EngineError::EngineGone)
    }
}

/// Owns the collector state. Ticks and delays run as spawned tasks that report
/// back through `msg_tx`, so commands are served while a tick is in flight.
struct EngineActor {
    config: EngineConfig,
    surfaces: Arc<dyn SurfaceProvider>,
    store: JobStore,
    downloader: Arc<dyn Downloader>,
    sink: Arc<dyn EventSink>,
    state: CollectorState,
    surface: Option<Arc<dyn Surface>>,
    msg_tx: mpsc::UnboundedSender<Msg>,
}

impl EngineActor {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::UnboundedReceiver<EngineCommand>,
        mut msg_rx: mpsc::UnboundedReceiver<Msg>,
    ) {
        engine_debug!("engine task started");
        loop {
            tokio::select! {
                command = cmd_rx.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                Some(msg) = msg_rx.recv() => self.dispatch(msg),
            }
        }
        engine_debug!("engine task stopped");
    }

    async fn handle_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Start { target, reply } => {
                let _ = reply.send(self.start(target).await);
            }
            EngineCommand::Stop { reply } => {
                self.dispatch(Msg::StopRequested);
                let _ = reply.send(());
            }
            EngineCommand::Status { reply } => {
                let _ = reply.send(self.state.view());
            }
            EngineCommand::CommitPending { reply } => {
                let _ = reply.send(self.store.commit_pending().map_err(EngineError::from));
            }
            EngineCommand::Export {
                id,
                format,
                file_name,
                reply,
            } => {
                let _ = reply.send(self.export(id, format, file_name.as_deref()));
            }
            EngineCommand::ClearHistory { reply } => {
                let _ = reply.send(self.store.clear_all().map_err(EngineError::from));
            }
            EngineCommand::UpdateSettings { settings, reply } => {
                let result = self.store.save_settings(settings);
                match &result {
                    Ok(()) => {
                        engine_info!("settings updated: auto_scroll={}", settings.auto_scroll);
                        self.dispatch(Msg::SettingsUpdated(settings));
                    }
                    Err(err) => engine_error!("failed to save settings: {}", err),
                }
                let _ = reply.send(result.map_err(EngineError::from));
            }
            EngineCommand::Settings { reply } => {
                let _ = reply.send(self.state.settings());
            }
            EngineCommand::History { reply } => {
                let _ = reply.send(self.store.history().map_err(EngineError::from));
            }
            EngineCommand::Fetch { id, reply } => {
                let _ = reply.send(self.store.fetch(id).map_err(EngineError::from));
            }
        }
    }

    async fn start(&mut self, target: String) -> Result<StartOutcome, EngineError> {
        if self.state.is_running() {
            engine_info!("start for {} ignored, a job is already running", target);
            return Ok(StartOutcome::AlreadyRunning);
        }

        let surface = self.surfaces.open(&target).await?;
        let location = surface.location().await?;
        let username = username_from_location(&location).ok_or_else(|| {
            SurfaceError::new(
                SurfaceFailure::InvalidLocation,
                format!("{location:?} is not a URL"),
            )
        })?;

        engine_info!("starting job target={} username={}", target, username);
        self.surface = Some(surface);
        self.dispatch(Msg::StartRequested {
            target,
            username: username.clone(),
        });
        Ok(StartOutcome::Started { username })
    }

    fn export(
        &self,
        id: u64,
        format: ExportFormat,
        file_name: Option<&str>,
    ) -> Result<ExportReceipt, EngineError> {
        let record = self
            .store
            .fetch(id)?
            .ok_or(ExportError::RecordNotFound(id))?;
        let rendered = render(&record, format, file_name)?;
        let bytes = rendered.to_bytes()?;

        self.downloader.slot().suggest(rendered.file_name.clone());
        let path = self.downloader.save(&bytes, &rendered.file_name)?;
        Ok(ExportReceipt { rendered, path })
    }

    /// Feeds `msg` through the state machine and runs the resulting effects.
    /// Follow-up messages raised while executing effects are handled in order.
    fn dispatch(&mut self, msg: Msg) {
        let mut queue = VecDeque::from([msg]);
        while let Some(msg) = queue.pop_front() {
            let was_running = self.state.is_running();
            let state = std::mem::take(&mut self.state);
            let (state, effects) = update(state, msg);
            self.state = state;
            if was_running && !self.state.is_running() {
                let status = self.state.view();
                engine_info!(
                    "job ended after {} ticks with {} items: {}",
                    status.ticks,
                    status.count,
                    status.message
                );
            }
            for effect in effects {
                if let Some(follow_up) = self.execute(effect) {
                    queue.push_back(follow_up);
                }
            }
        }
    }

    fn execute(&mut self, effect: Effect) -> Option<Msg> {
        match effect {
            Effect::PublishStatus => {
                set_collection_tick(if self.state.is_running() {
                    self.state.ticks()
                } else {
                    0
                });
                self.sink.emit(EngineEvent::StatusUpdate(self.state.view()));
                None
            }
            Effect::RunTick { run, auto_scroll } => {
                let Some(surface) = self.surface.clone() else {
                    return Some(Msg::TickFailed {
                        run,
                        reason: "no surface attached".to_string(),
                    });
                };
                let extractor = self.config.extractor.clone();
                let options = TickOptions {
                    auto_scroll,
                    settle_delay: self.config.settle_delay,
                };
                let limit = self.config.tick_timeout;
                let msg_tx = self.msg_tx.clone();
                let tick = collection_tick() + 1;
                engine_debug!(
                    "tick={} run={} auto_scroll={}",
                    tick,
                    run,
                    auto_scroll
                );
                tokio::spawn(async move {
                    let tick_fut = collect_tick(surface.as_ref(), extractor.as_ref(), options);
                    let msg = match tokio::time::timeout(limit, tick_fut).await {
                        Ok(Ok(outcome)) => Msg::TickCompleted {
                            run,
                            batch: outcome.into_batch(),
                        },
                        Ok(Err(err)) => {
                            engine_warn!("tick={} failed in run {}: {}", tick, run, err);
                            Msg::TickFailed {
                                run,
                                reason: err.to_string(),
                            }
                        }
                        Err(_) => {
                            engine_warn!("tick={} timed out in run {}", tick, run);
                            Msg::TickFailed {
                                run,
                                reason: format!("tick timed out after {}ms", limit.as_millis()),
                            }
                        }
                    };
                    let _ = msg_tx.send(msg);
                });
                None
            }
            Effect::ScheduleTick { run } => {
                let delay = self.config.tick_delay;
                let msg_tx = self.msg_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = msg_tx.send(Msg::TickDue { run });
                });
                None
            }
            Effect::DiscardPending => {
                self.store.discard_pending();
                None
            }
            Effect::StashPending(job) => {
                engine_info!("job for {} pending with {} items", job.username, job.len());
                self.store.stash(job);
                None
            }
            Effect::CommitJob(job) => match self.store.commit(&job.username, job.items) {
                Ok(_) => None,
                Err(err) => {
                    engine_error!("commit for {} failed: {}", job.username, err);
                    Some(Msg::CommitFailed {
                        reason: err.to_string(),
                    })
                }
            },
            Effect::ReleaseSurface => {
                if self.surface.take().is_none() {
                    engine_warn!("release requested with no surface attached");
                }
                None
            }
        }
    }
}
