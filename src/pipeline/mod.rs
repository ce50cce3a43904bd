//! Pipeline stages for document analysis.
//!
//! Each submodule implements exactly one step of the orchestrated run.
//! The two network collaborators sit behind traits so the orchestrator can
//! be driven by in-memory fakes in tests.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ storage ──▶ textract.start ──▶ poll ──▶ reconstruct
//! (path/URL)  (S3 put)    (job id)        (status, blocks)
//! ```
//!
//! 1. [`input`]    — canonicalise the user-supplied path or URL to a local file
//! 2. [`storage`]  — upload it under the derived object key ([`storage::ObjectStore`])
//! 3. [`textract`] — start the analysis and read job status/results
//!    ([`textract::AnalysisService`])
//! 4. [`poll`]     — bounded, cancellable wait for a terminal status

pub mod input;
pub mod poll;
pub mod storage;
pub mod textract;
