use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use engine_logging::{engine_info, engine_warn};
use postharvest_core::{Settings, Termination};
use postharvest_engine::{
    render, ChannelSink, DirDownloader, DirStorage, EngineEvent, EngineHandle, ExportFormat,
    FetchSettings, HttpProvider, ReplayProvider, StartOutcome, SurfaceProvider,
};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::config::AppConfig;

fn spawn_engine(
    config: &AppConfig,
    surfaces: Arc<dyn SurfaceProvider>,
) -> (EngineHandle, UnboundedReceiver<EngineEvent>) {
    let (sink, events) = ChannelSink::channel();
    let engine = EngineHandle::spawn(
        config.engine_config(),
        surfaces,
        Arc::new(DirStorage::new(&config.state_dir)),
        Arc::new(DirDownloader::new(&config.download_dir)),
        Arc::new(sink),
    );
    (engine, events)
}

/// Engine for commands that never open a surface.
fn history_engine(config: &AppConfig) -> EngineHandle {
    spawn_engine(config, Arc::new(HttpProvider::default())).0
}

pub async fn collect(
    config: &AppConfig,
    target: &str,
    replay_root: Option<PathBuf>,
    commit_partial: bool,
) -> anyhow::Result<()> {
    let surfaces: Arc<dyn SurfaceProvider> = match replay_root {
        Some(root) => Arc::new(ReplayProvider::new(root)),
        None => Arc::new(HttpProvider::new(FetchSettings::default())),
    };
    let (engine, mut events) = spawn_engine(config, surfaces);

    let username = match engine
        .start(target)
        .await
        .with_context(|| format!("could not start collecting from {target}"))?
    {
        StartOutcome::Started { username } => username,
        StartOutcome::AlreadyRunning => bail!("a collection job is already running"),
    };
    println!("Collecting posts from @{username} (Ctrl-C to stop)");

    let mut stopping = false;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(EngineEvent::StatusUpdate(status)) if status.is_running => {
                    println!("{}", status.message);
                }
                Some(EngineEvent::StatusUpdate(_)) => break,
                Some(EngineEvent::HistoryUpdate(_)) => {}
                None => bail!("engine stopped unexpectedly"),
            },
            signal = tokio::signal::ctrl_c(), if !stopping => {
                signal.context("failed to listen for Ctrl-C")?;
                stopping = true;
                engine_info!("Ctrl-C received, stopping");
                engine.stop().await?;
            }
        }
    }

    // The last status may be followed by a commit outcome; ask for the final word.
    let last = engine.status().await?;
    println!("{} ({} posts)", last.message, last.count);

    if last.message == Termination::Finished.message() {
        if let Some(record) = engine.history().await?.first() {
            println!("Saved as job {}", record.id);
        }
    } else if commit_partial {
        match engine.commit_pending().await? {
            Some(record) => println!("Saved partial job {} with {} posts", record.id, record.count),
            None => println!("Nothing collected, nothing saved"),
        }
    } else if last.count > 0 {
        engine_warn!("partial job with {} posts dropped", last.count);
        println!("Partial job not saved; rerun with --commit-partial to keep it");
    }
    Ok(())
}

pub async fn history(config: &AppConfig, json: bool) -> anyhow::Result<()> {
    let history = history_engine(config).history().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }
    if history.is_empty() {
        println!("No jobs in history");
    }
    for record in &history {
        println!(
            "{:>15}  {}  @{:<24} {:>6} posts",
            record.id, record.date, record.username, record.count
        );
    }
    Ok(())
}

pub async fn show(config: &AppConfig, id: u64) -> anyhow::Result<()> {
    let Some(record) = history_engine(config).fetch(id).await? else {
        bail!("no history record with id {id}");
    };
    println!("{}", render(&record, ExportFormat::Json, None)?.content);
    Ok(())
}

pub async fn export(
    config: &AppConfig,
    id: u64,
    format: &str,
    output: Option<String>,
) -> anyhow::Result<()> {
    let format: ExportFormat = format.parse()?;
    let receipt = history_engine(config)
        .export(id, format, output)
        .await
        .with_context(|| format!("export of job {id} failed"))?;
    println!(
        "Exported job {} as {} to {}",
        id,
        receipt.rendered.mime_type,
        receipt.path.display()
    );
    Ok(())
}

pub async fn clear(config: &AppConfig) -> anyhow::Result<()> {
    history_engine(config).clear_history().await?;
    println!("History cleared");
    Ok(())
}

pub async fn settings(config: &AppConfig, auto_scroll: Option<bool>) -> anyhow::Result<()> {
    let engine = history_engine(config);
    if let Some(auto_scroll) = auto_scroll {
        engine.update_settings(Settings { auto_scroll }).await?;
    }
    let current = engine.settings().await?;
    println!("auto_scroll = {}", current.auto_scroll);
    Ok(())
}
