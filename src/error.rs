//! Error types for the edgequake-textract library.
//!
//! [`AnalyzeError`] covers every failure that stops a run: a bad input path,
//! an upload that did not complete, a job Textract reports as failed, a job
//! that never finished within the poll budget. None of these are retried.
//!
//! Malformed block data is deliberately absent from this list. The
//! reconstructor degrades missing fields to `None` and skips dangling ids,
//! so a half-broken Textract response still produces output.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-textract library.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a usable file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Storage errors ────────────────────────────────────────────────────
    /// The document could not be stored in the bucket.
    #[error("Upload to s3://{bucket}/{key} failed: {reason}")]
    UploadFailed {
        bucket: String,
        key: String,
        reason: String,
    },

    // ── Analysis errors ───────────────────────────────────────────────────
    /// Textract refused to start the analysis job.
    #[error("Failed to start Textract analysis of s3://{bucket}/{key}: {reason}")]
    StartFailed {
        bucket: String,
        key: String,
        reason: String,
    },

    /// A status or result request for a running job failed.
    #[error("Failed to fetch status of Textract job {job_id}: {reason}")]
    StatusCheckFailed { job_id: String, reason: String },

    /// Textract reported the job as FAILED.
    #[error("Textract analysis failed (job {job_id}){}", message_suffix(.message))]
    JobFailed {
        job_id: String,
        message: Option<String>,
    },

    /// The job did not reach a terminal status within the poll budget.
    #[error("Textract job {job_id} still running after {attempts} status checks ({elapsed_secs}s)\nIncrease --max-polls or --poll-interval.")]
    JobTimedOut {
        job_id: String,
        attempts: u32,
        elapsed_secs: u64,
    },

    /// Polling was cancelled by the caller.
    #[error("Stopped waiting for Textract job {job_id}: cancelled")]
    Cancelled { job_id: String },

    // ── Offline input errors ──────────────────────────────────────────────
    /// A saved block file could not be read.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A saved block file is not a Textract response or block array.
    #[error("'{path}' is not a Textract block list: {source}")]
    BlocksParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output JSON file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn message_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(": {m}"))
        .unwrap_or_default()
}

impl AnalyzeError {
    /// Whether the failure happened before anything was sent to AWS.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            AnalyzeError::FileNotFound { .. }
                | AnalyzeError::PermissionDenied { .. }
                | AnalyzeError::InvalidInput { .. }
                | AnalyzeError::DownloadFailed { .. }
                | AnalyzeError::DownloadTimeout { .. }
                | AnalyzeError::ReadFailed { .. }
                | AnalyzeError::BlocksParseFailed { .. }
                | AnalyzeError::InvalidConfig(_)
        )
    }
}
