//! Wait for an analysis job to finish.
//!
//! ## Bounded polling
//!
//! Textract gives no completion callback without SNS wiring, so the job is
//! polled on a fixed interval. The number of checks is capped by
//! [`PollPolicy::max_attempts`] and every wait is raced against the config's
//! cancellation token, so a stuck remote job can neither hang the caller nor
//! outlive a Ctrl-C. Only SUCCEEDED and FAILED stop the loop early.

use crate::blocks::Block;
use crate::config::{AnalysisConfig, PollPolicy};
use crate::error::AnalyzeError;
use crate::pipeline::textract::{AnalysisService, JobStatus};
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

/// A job that reached SUCCEEDED, with its full block list.
#[derive(Debug)]
pub struct CompletedJob {
    pub blocks: Vec<Block>,
    /// Status checks issued, including the one that saw SUCCEEDED.
    pub attempts: u32,
}

/// Poll `job_id` until it succeeds, fails, runs out of attempts, or is cancelled.
///
/// # Errors
/// - [`AnalyzeError::JobFailed`] when Textract reports FAILED
/// - [`AnalyzeError::JobTimedOut`] when `max_attempts` checks pass without a terminal status
/// - [`AnalyzeError::Cancelled`] when the cancellation token fires
/// - [`AnalyzeError::StatusCheckFailed`] when a status request itself fails
pub async fn wait_for_completion(
    service: &dyn AnalysisService,
    job_id: &str,
    config: &AnalysisConfig,
) -> Result<CompletedJob, AnalyzeError> {
    let PollPolicy {
        interval,
        max_attempts,
    } = config.poll;
    let cancel = &config.cancellation_token;
    let start = Instant::now();

    for attempt in 1..=max_attempts {
        if cancel.is_cancelled() {
            return Err(AnalyzeError::Cancelled {
                job_id: job_id.to_string(),
            });
        }

        let poll = service.poll(job_id).await?;
        info!("Textract job status: {}", poll.status);
        if let Some(ref cb) = config.progress_callback {
            cb.on_poll(job_id, attempt, &poll.status);
        }

        match poll.status {
            JobStatus::Succeeded => {
                return Ok(CompletedJob {
                    blocks: poll.blocks,
                    attempts: attempt,
                });
            }
            JobStatus::Failed => {
                return Err(AnalyzeError::JobFailed {
                    job_id: job_id.to_string(),
                    message: poll.status_message,
                });
            }
            _ if attempt == max_attempts => break,
            _ => {
                debug!(
                    "Job {}: check {}/{} not terminal, waiting {:?}",
                    job_id, attempt, max_attempts, interval
                );
                tokio::select! {
                    _ = sleep(interval) => {}
                    _ = cancel.cancelled() => {
                        return Err(AnalyzeError::Cancelled {
                            job_id: job_id.to_string(),
                        });
                    }
                }
            }
        }
    }

    Err(AnalyzeError::JobTimedOut {
        job_id: job_id.to_string(),
        attempts: max_attempts,
        elapsed_secs: start.elapsed().as_secs(),
    })
}
