use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};

use crate::{PageSnapshot, SurfaceError, SurfaceFailure};

/// Name of the file in a replay directory holding the recorded page address.
pub const REPLAY_LOCATION_FILE: &str = "location.txt";

/// A rendered, scrollable page the collector works against.
#[async_trait]
pub trait Surface: Send + Sync {
    /// Addressable location of the page.
    async fn location(&self) -> Result<String, SurfaceError>;
    /// Current content height; stops changing once nothing more lazy-loads.
    async fn content_height(&self) -> Result<u64, SurfaceError>;
    /// Triggers the lazy-load mutation.
    async fn scroll_to_bottom(&self) -> Result<(), SurfaceError>;
    /// Reads the currently rendered document.
    async fn capture(&self) -> Result<PageSnapshot, SurfaceError>;
}

/// Looks up the surface behind a target handle.
#[async_trait]
pub trait SurfaceProvider: Send + Sync {
    async fn open(&self, target: &str) -> Result<Arc<dyn Surface>, SurfaceError>;
}

/// Replays a recorded scroll session.
///
/// Frame 0 is the initial render; each scroll reveals the next frame until the
/// last one, after which scrolling no longer changes the content height.
#[derive(Debug)]
pub struct ReplaySurface {
    location: String,
    frames: Vec<String>,
    revealed: Mutex<usize>,
}

impl ReplaySurface {
    pub fn new(location: impl Into<String>, frames: Vec<String>) -> Result<Self, SurfaceError> {
        if frames.is_empty() {
            return Err(SurfaceError::new(
                SurfaceFailure::Unreachable,
                "replay has no frames",
            ));
        }
        Ok(Self {
            location: location.into(),
            frames,
            revealed: Mutex::new(0),
        })
    }

    /// Loads `*.html` frames sorted by file name, plus the page address from
    /// [`REPLAY_LOCATION_FILE`].
    pub fn from_dir(dir: &Path) -> Result<Self, SurfaceError> {
        let io_err = |err: std::io::Error| {
            SurfaceError::new(SurfaceFailure::Unreachable, format!("{dir:?}: {err}"))
        };
        let location = fs::read_to_string(dir.join(REPLAY_LOCATION_FILE))
            .map_err(|err| {
                SurfaceError::new(
                    SurfaceFailure::InvalidLocation,
                    format!("missing {REPLAY_LOCATION_FILE} in {dir:?}: {err}"),
                )
            })?
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();

        let mut paths: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(io_err)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("html"))
            .collect();
        paths.sort();

        let frames = paths
            .iter()
            .map(fs::read_to_string)
            .collect::<Result<Vec<_>, _>>()
            .map_err(io_err)?;
        Self::new(location, frames)
    }

    fn revealed(&self) -> Result<usize, SurfaceError> {
        self.revealed
            .lock()
            .map(|guard| *guard)
            .map_err(|_| SurfaceError::new(SurfaceFailure::Io, "replay state poisoned"))
    }
}

#[async_trait]
impl Surface for ReplaySurface {
    async fn location(&self) -> Result<String, SurfaceError> {
        Ok(self.location.clone())
    }

    async fn content_height(&self) -> Result<u64, SurfaceError> {
        let revealed = self.revealed()?;
        Ok(self.frames[..=revealed]
            .iter()
            .map(|frame| frame.len() as u64)
            .sum())
    }

    async fn scroll_to_bottom(&self) -> Result<(), SurfaceError> {
        let mut guard = self
            .revealed
            .lock()
            .map_err(|_| SurfaceError::new(SurfaceFailure::Io, "replay state poisoned"))?;
        if *guard + 1 < self.frames.len() {
            *guard += 1;
        }
        Ok(())
    }

    async fn capture(&self) -> Result<PageSnapshot, SurfaceError> {
        let revealed = self.revealed()?;
        Ok(PageSnapshot {
            url: self.location.clone(),
            html: self.frames[revealed].clone(),
            captured_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        })
    }
}

/// Resolves targets as replay directories below `root`.
#[derive(Debug, Clone)]
pub struct ReplayProvider {
    root: PathBuf,
}

impl ReplayProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl SurfaceProvider for ReplayProvider {
    async fn open(&self, target: &str) -> Result<Arc<dyn Surface>, SurfaceError> {
        let dir = self.root.join(target);
        if !dir.is_dir() {
            return Err(SurfaceError::new(
                SurfaceFailure::Unreachable,
                format!("no replay directory at {dir:?}"),
            ));
        }
        Ok(Arc::new(ReplaySurface::from_dir(&dir)?))
    }
}
