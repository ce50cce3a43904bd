//! # edgequake-textract
//!
//! Analyse PDF documents with AWS Textract and rebuild what it finds into
//! three usable views: raw text, form key/value pairs, and tables of cells.
//!
//! ## Why this crate?
//!
//! Textract's asynchronous analysis API answers with a flat list of blocks
//! joined only by typed id references. A form field is a `KEY_VALUE_SET`
//! pointing at its words and, through a `VALUE` edge, at another set pointing
//! at more words; a table is a `TABLE` pointing at `CELL`s pointing at words.
//! This crate handles the S3 upload and job polling, then walks that graph
//! and hands back plain structs.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input        resolve local file or download from URL
//!  ├─ 2. Upload       PutObject to s3://bucket/prefix/name.pdf
//!  ├─ 3. Start        StartDocumentAnalysis (FORMS + TABLES)
//!  ├─ 4. Poll         GetDocumentAnalysis every 5 s, bounded, cancellable
//!  ├─ 5. Reconstruct  blocks → raw text, key/values, tables
//!  └─ 6. Output       JSON result + run stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_textract::{analyze, AnalysisConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Credentials and region come from the usual AWS chain.
//!     let config = AnalysisConfig::builder().bucket("my-documents").build()?;
//!     let output = analyze("invoice.pdf", &config).await?;
//!     for kv in &output.result.key_values {
//!         println!("{} = {}", kv.key, kv.value);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! The reconstructor is usable on its own, e.g. on a saved response:
//!
//! ```rust
//! use edgequake_textract::{reconstruct, BlockSet};
//!
//! let json = r#"{"Blocks": [{"BlockType": "WORD", "Id": "w1", "Text": "Hello"}]}"#;
//! let blocks = BlockSet::from_json(json).unwrap().into_blocks();
//! let result = reconstruct(&blocks);
//! assert_eq!(result.raw_text[0].text, "Hello");
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf-analyze` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod blocks;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod reconstruct;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{analyze, analyze_sync, analyze_to_file, analyze_with, reconstruct_file};
pub use blocks::{Block, BlockSet, BlockType, BoundingBox, EntityType, RelationshipType};
pub use config::{AnalysisConfig, AnalysisConfigBuilder, CellOrder, FeatureType, PollPolicy};
pub use error::AnalyzeError;
pub use output::{
    AnalysisOutput, AnalysisResult, AnalysisStats, Cell, KeyValuePair, PairConfidence, Table,
    TextItem,
};
pub use pipeline::storage::{ObjectStore, S3ObjectStore};
pub use pipeline::textract::{AnalysisService, JobPoll, JobStatus, TextractService};
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, ProgressCallback};
pub use reconstruct::{reconstruct, reconstruct_with, BlockIndex};
