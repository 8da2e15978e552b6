//! Post harvester core: domain types, the pure collection state machine and
//! its read-only status view.
mod accumulator;
mod effect;
mod item;
mod msg;
mod state;
mod update;
mod url_shape;
mod view_model;

pub use accumulator::Accumulator;
pub use effect::Effect;
pub use item::{ExtractionMode, Item, ItemKind, JobSnapshot, PageSource, Settings};
pub use msg::{Msg, TickBatch};
pub use state::{CollectorState, RunId, SessionState, Termination, READY_MESSAGE};
pub use update::update;
pub use url_shape::{
    canonical_post_url, classify_page, profile_segment, username_from_location,
    UNKNOWN_USERNAME,
};
pub use view_model::StatusSnapshot;
