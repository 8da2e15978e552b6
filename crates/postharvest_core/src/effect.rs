use crate::{JobSnapshot, RunId};

/// Side effects requested by [`crate::update`]; executed by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Push a fresh status snapshot to observers.
    PublishStatus,
    /// Run one extraction tick against the current surface.
    RunTick { run: RunId, auto_scroll: bool },
    /// Wait the inter-tick delay, then report `Msg::TickDue`.
    ScheduleTick { run: RunId },
    /// Forget any job left over from a previous run.
    DiscardPending,
    /// Keep the job for a later explicit commit.
    StashPending(JobSnapshot),
    /// Write the job to history now.
    CommitJob(JobSnapshot),
    /// The run is over; the surface handle can be dropped.
    ReleaseSurface,
}
