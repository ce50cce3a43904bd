//! Output types: the structured views rebuilt from the block graph, plus
//! run metadata for the orchestrated path.
//!
//! Field names serialise in PascalCase so the JSON printed by the CLI reads
//! like Textract's own responses:
//!
//! ```text
//! { "RawText":   [ {Text, Type, Page, Confidence, BoundingBox}, … ],
//!   "KeyValues": [ {Key, Value, KeyBox, ValueBox, Confidence: {Key, Value}}, … ],
//!   "Tables":    [ {Page, Cells: [ {Row, Column, Text, BoundingBox, Confidence}, … ]}, … ] }
//! ```
//!
//! Optional values that Textract did not send serialise as `null`.

use crate::blocks::{BlockType, BoundingBox};
use serde::{Deserialize, Serialize};

/// One `WORD` or `LINE` block, copied verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TextItem {
    pub text: String,
    #[serde(rename = "Type")]
    pub kind: BlockType,
    pub page: Option<u32>,
    pub confidence: Option<f32>,
    pub bounding_box: Option<BoundingBox>,
}

/// Confidence of both halves of a form field.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PairConfidence {
    pub key: Option<f32>,
    pub value: Option<f32>,
}

/// A form field: the text of a `KEY` set and of the `VALUE` set it points at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeyValuePair {
    pub key: String,
    pub value: String,
    pub key_box: Option<BoundingBox>,
    pub value_box: Option<BoundingBox>,
    pub confidence: PairConfidence,
}

/// A table cell. Indices are 1-based, as Textract reports them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Cell {
    pub row: Option<u32>,
    pub column: Option<u32>,
    pub text: String,
    pub bounding_box: Option<BoundingBox>,
    pub confidence: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Table {
    pub page: Option<u32>,
    pub cells: Vec<Cell>,
}

impl Table {
    /// Number of rows, taken as the highest row index seen.
    pub fn row_count(&self) -> u32 {
        self.cells.iter().filter_map(|c| c.row).max().unwrap_or(0)
    }

    /// Number of columns, taken as the highest column index seen.
    pub fn column_count(&self) -> u32 {
        self.cells.iter().filter_map(|c| c.column).max().unwrap_or(0)
    }
}

/// The three views rebuilt from one analysed document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AnalysisResult {
    pub raw_text: Vec<TextItem>,
    pub key_values: Vec<KeyValuePair>,
    pub tables: Vec<Table>,
}

impl AnalysisResult {
    pub fn is_empty(&self) -> bool {
        self.raw_text.is_empty() && self.key_values.is_empty() && self.tables.is_empty()
    }
}

/// Timing and volume figures for one orchestrated run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisStats {
    /// Blocks returned by Textract, across all result pages.
    pub block_count: usize,
    /// Status requests issued before the job reached a terminal state.
    pub poll_attempts: u32,
    pub upload_duration_ms: u64,
    /// From job submission to the last result page fetched.
    pub analysis_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything an orchestrated run produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub result: AnalysisResult,
    pub job_id: String,
    pub bucket: String,
    pub key: String,
    pub stats: AnalysisStats,
}
