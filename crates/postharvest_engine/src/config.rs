use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::extract::{Extractor, HeuristicExtractor};

/// Source of "now" for record ids and dates.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

#[derive(Clone)]
pub struct EngineConfig {
    /// Wait between the scroll and reading the page.
    pub settle_delay: Duration,
    /// Wait between two ticks.
    pub tick_delay: Duration,
    /// A tick running longer than this counts as failed.
    pub tick_timeout: Duration,
    pub clock: Clock,
    pub extractor: Arc<dyn Extractor>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(2),
            tick_delay: Duration::from_secs(1),
            tick_timeout: Duration::from_secs(30),
            clock: system_clock(),
            extractor: Arc::new(HeuristicExtractor),
        }
    }
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("settle_delay", &self.settle_delay)
            .field("tick_delay", &self.tick_delay)
            .field("tick_timeout", &self.tick_timeout)
            .finish_non_exhaustive()
    }
}
