//! Progress-callback trait for upload and job-polling events.
//!
//! Inject an [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::config::AnalysisConfigBuilder::progress_callback`] to follow a
//! run as it moves through upload, job submission, polling and result
//! retrieval. A Textract job on a long document can take minutes, and the
//! only signal in that time is the status returned by each poll.
//!
//! # Example
//!
//! ```rust
//! use edgequake_textract::{AnalysisConfig, AnalysisProgressCallback, JobStatus};
//! use std::sync::Arc;
//!
//! struct StatusPrinter;
//!
//! impl AnalysisProgressCallback for StatusPrinter {
//!     fn on_poll(&self, job_id: &str, attempt: u32, status: &JobStatus) {
//!         eprintln!("{job_id}: check {attempt} → {status}");
//!     }
//! }
//!
//! let config = AnalysisConfig::builder()
//!     .bucket("my-documents")
//!     .progress_callback(Arc::new(StatusPrinter) as Arc<dyn AnalysisProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::pipeline::textract::JobStatus;
use std::sync::Arc;

/// Called by the orchestrator at each stage of a run.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait AnalysisProgressCallback: Send + Sync {
    /// Called just before the document is uploaded.
    fn on_upload_start(&self, bucket: &str, key: &str, size_bytes: u64) {
        let _ = (bucket, key, size_bytes);
    }

    /// Called once the object is stored.
    fn on_upload_complete(&self, bucket: &str, key: &str) {
        let _ = (bucket, key);
    }

    /// Called when the upload or the job submission fails. No job exists yet.
    fn on_submit_error(&self, bucket: &str, key: &str, error: &str) {
        let _ = (bucket, key, error);
    }

    /// Called when Textract has accepted the job.
    fn on_job_started(&self, job_id: &str) {
        let _ = job_id;
    }

    /// Called after every status check.
    ///
    /// # Arguments
    /// * `attempt` — 1-based status-check counter
    /// * `status`  — status returned by this check
    fn on_poll(&self, job_id: &str, attempt: u32, status: &JobStatus) {
        let _ = (job_id, attempt, status);
    }

    /// Called once all result pages have been fetched.
    fn on_job_complete(&self, job_id: &str, block_count: usize) {
        let _ = (job_id, block_count);
    }

    /// Called when the job ends without results (failed, timed out, cancelled).
    fn on_job_error(&self, job_id: &str, error: &str) {
        let _ = (job_id, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AnalysisConfig`].
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;
