//! Post harvester engine: surfaces, extraction, the job store, exports and
//! the task that executes the core state machine's effects.
mod config;
mod counter;
mod decode;
mod engine;
mod export;
mod extract;
mod fetch;
mod filename;
mod persist;
mod sink;
mod store;
mod surface;
mod tick;
mod types;

pub use config::{system_clock, Clock, EngineConfig};
pub use counter::{is_counter_text, parse_shorthand_count};
pub use decode::decode_document;
pub use engine::{EngineError, EngineHandle, ExportReceipt, StartOutcome};
pub use export::{render, ExportError, ExportFormat, PayloadEncoding, RenderedExport, COLUMNS};
pub use extract::{Extraction, Extractor, HeuristicExtractor};
pub use fetch::{FetchSettings, HttpProvider, HttpSurface};
pub use filename::{derive_filename, sanitize_filename, DirDownloader, Downloader, FilenameSlot};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use sink::{ChannelSink, EventSink};
pub use store::{
    DirStorage, HistoryRecord, JobStore, StateStorage, StoreError, HISTORY_KEY, SETTINGS_KEY,
};
pub use surface::{ReplayProvider, ReplaySurface, Surface, SurfaceProvider, REPLAY_LOCATION_FILE};
pub use tick::{collect_tick, TickOptions, TickOutcome};
pub use types::{EngineEvent, PageSnapshot, SurfaceError, SurfaceFailure};
