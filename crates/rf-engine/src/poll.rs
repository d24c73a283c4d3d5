//! Pipeline watch loop for merge proposals.
//!
//! Watches the latest pipeline of a proposal's head, re-running it when it
//! fails or gets canceled, until it either succeeds, lands in a state no
//! retry can fix, or the head itself moves under us. Sleeping is injected
//! so tests run the loop without waiting.

use crate::remote::Remote;
use anyhow::Result;
use rf_model::{Item, PipelineStatus};
use std::time::Duration;

/// Interval between pipeline checks.
pub const POLL_INTERVAL: Duration = Duration::from_secs(180);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The pipeline finished green.
    Succeeded,
    /// The head the pipeline ran against is no longer the proposal's
    /// head; watching it further is meaningless.
    HeadMoved,
    /// Terminal state that retrying cannot fix, or no pipeline exists.
    Stuck,
}

/// Watch and retry the latest pipeline of `item` until a terminal outcome.
///
/// `head` is the proposal's head revision at the time the watch started;
/// a pipeline reporting a different sha means new commits were pushed and
/// the loop stops rather than babysit an outdated revision.
pub fn poll_pipeline(
    remote: &mut dyn Remote,
    item: &Item,
    head: &str,
    sleep: &mut dyn FnMut(Duration),
) -> Result<PollOutcome> {
    loop {
        let Some(pipeline) = remote.latest_pipeline(item)? else {
            log::warn!("{}: no pipeline to watch", item.container());
            return Ok(PollOutcome::Stuck);
        };
        if pipeline.sha != head {
            log::info!("{}: head moved to {}", item.container(), pipeline.sha);
            return Ok(PollOutcome::HeadMoved);
        }
        match pipeline.status {
            PipelineStatus::Success => return Ok(PollOutcome::Succeeded),
            PipelineStatus::Running | PipelineStatus::Pending => sleep(POLL_INTERVAL),
            status if status.is_retryable() => {
                log::info!(
                    "{}: pipeline {} is {:?}, retrying",
                    item.container(),
                    pipeline.id,
                    status
                );
                remote.retry_pipeline(item, &pipeline)?;
                sleep(POLL_INTERVAL);
            }
            status => {
                log::warn!(
                    "{}: pipeline {} is {:?}, giving up",
                    item.container(),
                    pipeline.id,
                    status
                );
                return Ok(PollOutcome::Stuck);
            }
        }
    }
}
