use std::path::PathBuf;
use std::sync::Mutex;

use engine_logging::{engine_info, engine_warn};

use crate::export::ExportError;
use crate::persist::AtomicFileWriter;

const MAX_STEM_LEN: usize = 80;

/// `<username>_<id>.<ext>`, safe to create on any desktop filesystem.
pub fn derive_filename(username: &str, id: u64, extension: &str) -> String {
    sanitize_filename(&format!("{username}_{id}.{extension}"))
}

/// Replaces forbidden characters, collapses underscore runs and keeps the
/// extension intact when the stem has to be shortened.
pub fn sanitize_filename(input: &str) -> String {
    let (stem, extension) = match input.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
        _ => (input, None),
    };

    let mut stem = sanitize_stem(stem);
    if is_reserved_windows_name(&stem) {
        stem.push('_');
    }
    match extension {
        Some(ext) => format!("{stem}.{}", sanitize_stem(ext)),
        None => stem,
    }
}

fn sanitize_stem(input: &str) -> String {
    let replaced: String = input
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    let trimmed = replaced.trim_matches(&['_', ' ', '.'][..]);

    let mut compacted = String::with_capacity(trimmed.len());
    let mut prev_underscore = false;
    for c in trimmed.chars() {
        if c == '_' && prev_underscore {
            continue;
        }
        prev_underscore = c == '_';
        compacted.push(c);
    }

    let mut name: String = compacted.chars().take(MAX_STEM_LEN).collect();
    if name.is_empty() {
        name = "export".to_string();
    }
    name
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

/// Holds the name for the next download only. A newer suggestion replaces an
/// unused older one; taking it empties the slot.
#[derive(Debug, Default)]
pub struct FilenameSlot {
    next: Mutex<Option<String>>,
}

impl FilenameSlot {
    pub fn suggest(&self, name: impl Into<String>) {
        let mut slot = self.next.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(name.into());
    }

    pub fn take(&self) -> Option<String> {
        let mut slot = self.next.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        slot.take()
    }
}

/// Turns export bytes into a user-visible file.
pub trait Downloader: Send + Sync {
    /// Saves `bytes` under the pending suggested name, or `fallback_name` when
    /// no suggestion is waiting.
    fn save(&self, bytes: &[u8], fallback_name: &str) -> Result<PathBuf, ExportError>;

    fn slot(&self) -> &FilenameSlot;
}

/// Saves downloads into one directory.
#[derive(Debug)]
pub struct DirDownloader {
    writer: AtomicFileWriter,
    slot: FilenameSlot,
}

impl DirDownloader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            writer: AtomicFileWriter::new(dir.into()),
            slot: FilenameSlot::default(),
        }
    }
}

impl Downloader for DirDownloader {
    fn save(&self, bytes: &[u8], fallback_name: &str) -> Result<PathBuf, ExportError> {
        let name = match self.slot.take() {
            Some(name) => name,
            None => {
                engine_warn!("no suggested filename waiting, using {}", fallback_name);
                fallback_name.to_string()
            }
        };
        let path = self.writer.write(&sanitize_filename(&name), bytes)?;
        engine_info!("download saved to {}", path.display());
        Ok(path)
    }

    fn slot(&self) -> &FilenameSlot {
        &self.slot
    }
}
