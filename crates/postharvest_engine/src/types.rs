use std::fmt;

use postharvest_core::StatusSnapshot;

use crate::store::HistoryRecord;

/// Notifications pushed to observers. Delivery is fire-and-forget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    StatusUpdate(StatusSnapshot),
    HistoryUpdate(Vec<HistoryRecord>),
}

/// One rendered state of a surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSnapshot {
    /// Address of the page at capture time.
    pub url: String,
    pub html: String,
    /// RFC3339 capture time; default `createdAt` for posts without a timestamp.
    pub captured_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct SurfaceError {
    pub kind: SurfaceFailure,
    pub message: String,
}

impl SurfaceError {
    pub fn new(kind: SurfaceFailure, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceFailure {
    /// The target does not exist or cannot be reached.
    Unreachable,
    /// The target's location is not a usable URL.
    InvalidLocation,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType { content_type: String },
    Decode,
    Io,
}

impl fmt::Display for SurfaceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceFailure::Unreachable => write!(f, "target unreachable"),
            SurfaceFailure::InvalidLocation => write!(f, "invalid location"),
            SurfaceFailure::HttpStatus(code) => write!(f, "http status {code}"),
            SurfaceFailure::Timeout => write!(f, "timeout"),
            SurfaceFailure::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            SurfaceFailure::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            SurfaceFailure::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            SurfaceFailure::Decode => write!(f, "decode error"),
            SurfaceFailure::Io => write!(f, "io error"),
        }
    }
}
