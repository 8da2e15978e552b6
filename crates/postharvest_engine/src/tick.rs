use std::time::Duration;

use engine_logging::{collection_tick, engine_debug};
use postharvest_core::TickBatch;

use crate::extract::{Extraction, Extractor};
use crate::surface::Surface;
use crate::SurfaceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOptions {
    pub auto_scroll: bool,
    /// Wait after the scroll before reading, so lazy content can render.
    pub settle_delay: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    pub extraction: Extraction,
    pub height_before: u64,
    pub height_after: u64,
}

impl TickOutcome {
    /// The page did not grow during this tick.
    pub fn end_of_page(&self) -> bool {
        self.height_before == self.height_after
    }

    pub fn into_batch(self) -> TickBatch {
        TickBatch {
            end_of_page: self.end_of_page(),
            items: self.extraction.items,
            mode: self.extraction.mode,
        }
    }
}

/// One scroll-settle-extract pass. Has no effect beyond the scroll itself and
/// can be re-run freely.
pub async fn collect_tick(
    surface: &dyn Surface,
    extractor: &dyn Extractor,
    options: TickOptions,
) -> Result<TickOutcome, SurfaceError> {
    let height_before = surface.content_height().await?;
    if options.auto_scroll {
        surface.scroll_to_bottom().await?;
    }
    tokio::time::sleep(options.settle_delay).await;

    let snapshot = surface.capture().await?;
    let extraction = extractor.extract(&snapshot);
    let height_after = surface.content_height().await?;

    // The published counter only moves once this tick is merged.
    engine_debug!(
        "tick={} extracted {} items from {} (source={:?} mode={:?} height {} -> {})",
        collection_tick() + 1,
        extraction.items.len(),
        snapshot.url,
        extraction.page_source,
        extraction.mode,
        height_before,
        height_after
    );

    Ok(TickOutcome {
        extraction,
        height_before,
        height_after,
    })
}
