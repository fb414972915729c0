//! Frame ingestion sources.
//!
//! Sources produce `Frame` instances at a target rate and push them into a
//! pipeline session without waiting. A frame the pipeline cannot take right
//! away is simply lost; sources never buffer.

pub mod synthetic;

pub use synthetic::{SourceConfig, SourceStats, SyntheticSource};

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::time::{Instant, MissedTickBehavior};

use crate::pipeline::PipelineHandle;

/// Counters for one `pump` run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PumpStats {
    pub submitted: u64,
    /// Frames the pipeline inbox refused because it was still occupied.
    pub refused: u64,
}

/// Feed frames from `source` into the session at the source's frame rate until
/// `stop` is set or `until` passes.
pub async fn pump(
    source: &mut SyntheticSource,
    handle: &PipelineHandle,
    stop: &AtomicBool,
    until: Option<Instant>,
) -> Result<PumpStats> {
    let mut stats = PumpStats::default();
    let mut ticker = tokio::time::interval(source.frame_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    while !stop.load(Ordering::SeqCst) {
        let tick = ticker.tick().await;
        if until.is_some_and(|deadline| tick >= deadline) {
            break;
        }
        let frame = source.next_frame()?;
        if handle.submit_frame(frame) {
            stats.submitted += 1;
        } else {
            stats.refused += 1;
            log::trace!("frame refused by pipeline inbox");
        }
    }
    Ok(stats)
}
