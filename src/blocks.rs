//! The flat block graph returned by Textract.
//!
//! Textract does not nest its output. A document comes back as one long list
//! of [`Block`]s, each carrying an opaque `Id` and a list of typed
//! [`Relationship`] edges that point at other blocks by id. Words hang off
//! lines, lines off pages, words off key/value sets and cells, cells off
//! tables. Recovering that hierarchy is the job of [`crate::reconstruct`].
//!
//! The types here mirror Textract's PascalCase JSON wire format so a saved
//! `GetDocumentAnalysis` response can be deserialised directly. Every field
//! except the id and type is optional on the wire, and unknown type tags
//! deserialise into an `Other` variant instead of failing the whole document.
//! Decoding is tolerant at field level: a `null` list reads as empty, and a
//! field of the wrong shape (a bounding box missing a coordinate, a negative
//! page) reads as absent rather than rejecting the file.

use serde::de::{DeserializeOwned, Deserializer, Error as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Kind of a block. Only the first five are inspected by the reconstructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockType {
    Word,
    Line,
    KeyValueSet,
    Table,
    Cell,
    Page,
    SelectionElement,
    MergedCell,
    Title,
    Query,
    QueryResult,
    Signature,
    TableTitle,
    TableFooter,
    /// Any tag this crate does not know about.
    #[default]
    #[serde(other)]
    Other,
}

impl BlockType {
    /// Parse a wire tag such as `"KEY_VALUE_SET"`. Unknown tags map to [`BlockType::Other`].
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "WORD" => Self::Word,
            "LINE" => Self::Line,
            "KEY_VALUE_SET" => Self::KeyValueSet,
            "TABLE" => Self::Table,
            "CELL" => Self::Cell,
            "PAGE" => Self::Page,
            "SELECTION_ELEMENT" => Self::SelectionElement,
            "MERGED_CELL" => Self::MergedCell,
            "TITLE" => Self::Title,
            "QUERY" => Self::Query,
            "QUERY_RESULT" => Self::QueryResult,
            "SIGNATURE" => Self::Signature,
            "TABLE_TITLE" => Self::TableTitle,
            "TABLE_FOOTER" => Self::TableFooter,
            _ => Self::Other,
        }
    }

    /// Whether the block carries a piece of recognised text (`WORD` or `LINE`).
    pub fn is_text(self) -> bool {
        matches!(self, Self::Word | Self::Line)
    }
}

/// Entity-role tag attached to `KEY_VALUE_SET` (and some `CELL`) blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Key,
    Value,
    ColumnHeader,
    #[serde(other)]
    Other,
}

impl EntityType {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "KEY" => Self::Key,
            "VALUE" => Self::Value,
            "COLUMN_HEADER" => Self::ColumnHeader,
            _ => Self::Other,
        }
    }
}

/// Role of a relationship edge. Anything but `CHILD` and `VALUE` is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    Child,
    Value,
    #[default]
    #[serde(other)]
    Other,
}

impl RelationshipType {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "CHILD" => Self::Child,
            "VALUE" => Self::Value,
            _ => Self::Other,
        }
    }
}

/// A typed edge from one block to an ordered list of target block ids.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Relationship {
    #[serde(rename = "Type", default, deserialize_with = "lenient_or_default")]
    pub kind: RelationshipType,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub ids: Vec<String>,
}

/// Axis-aligned box in page-normalised coordinates (0.0–1.0).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BoundingBox {
    pub width: f32,
    pub height: f32,
    pub left: f32,
    pub top: f32,
}

/// Location of a block on its page. The polygon Textract also sends is not kept.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Geometry {
    #[serde(default, deserialize_with = "lenient")]
    pub bounding_box: Option<BoundingBox>,
}

/// One node of the flat block graph.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Block {
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub block_type: BlockType,
    #[serde(default, deserialize_with = "lenient")]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub page: Option<u32>,
    /// 0–100.
    #[serde(default, deserialize_with = "lenient")]
    pub confidence: Option<f32>,
    #[serde(default, deserialize_with = "lenient")]
    pub geometry: Option<Geometry>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub entity_types: Vec<EntityType>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub relationships: Vec<Relationship>,
    /// 1-based, `CELL` blocks only.
    #[serde(default, deserialize_with = "lenient")]
    pub row_index: Option<u32>,
    /// 1-based, `CELL` blocks only.
    #[serde(default, deserialize_with = "lenient")]
    pub column_index: Option<u32>,
}

impl Block {
    /// Create a bare block with only an id and type set.
    pub fn new(id: impl Into<String>, block_type: BlockType) -> Self {
        Self {
            id: id.into(),
            block_type,
            ..Default::default()
        }
    }

    /// Create a `WORD` block with the given text.
    pub fn word(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::new(id, BlockType::Word)
        }
    }

    pub fn with_relationship(mut self, kind: RelationshipType, ids: &[&str]) -> Self {
        self.relationships.push(Relationship {
            kind,
            ids: ids.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    pub fn with_entity(mut self, entity: EntityType) -> Self {
        self.entity_types.push(entity);
        self
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_bounding_box(mut self, bbox: BoundingBox) -> Self {
        self.geometry = Some(Geometry {
            bounding_box: Some(bbox),
        });
        self
    }

    pub fn with_cell_index(mut self, row: u32, column: u32) -> Self {
        self.row_index = Some(row);
        self.column_index = Some(column);
        self
    }

    /// The block's bounding box, if Textract sent one.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.geometry.and_then(|g| g.bounding_box)
    }

    pub fn has_entity(&self, entity: EntityType) -> bool {
        self.entity_types.contains(&entity)
    }

    /// All target ids of edges with the given role, in edge order then list order.
    pub fn related_ids(&self, kind: RelationshipType) -> impl Iterator<Item = &str> {
        self.relationships
            .iter()
            .filter(move |r| r.kind == kind)
            .flat_map(|r| r.ids.iter().map(String::as_str))
    }

    /// The first edge with the given role, if any.
    pub fn relationship(&self, kind: RelationshipType) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.kind == kind)
    }
}

/// A value of the wrong shape reads as absent.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

fn lenient_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    lenient(deserializer).map(Option::unwrap_or_default)
}

/// `null` or a non-array reads as empty; elements that do not decode are skipped.
fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => Ok(decode_items(items)),
        _ => Ok(Vec::new()),
    }
}

fn decode_items<T: DeserializeOwned>(items: Vec<Value>) -> Vec<T> {
    let total = items.len();
    let decoded: Vec<T> = items
        .into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect();
    if decoded.len() < total {
        debug!("Skipped {} undecodable list entries", total - decoded.len());
    }
    decoded
}

/// A saved Textract response, or just its block list.
///
/// Both `{"JobStatus": ..., "Blocks": [...]}` and a bare `[...]` are accepted
/// so output captured with `aws textract get-document-analysis` can be fed
/// straight back in. An object must carry a `Blocks` array unless it records
/// a `JobStatus`; a job that did not succeed usually has no blocks at all.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockSet {
    /// Present when the response was saved together with its request.
    pub job_id: Option<String>,
    /// `JobStatus` of the saved response; `None` for a bare array.
    pub job_status: Option<String>,
    pub status_message: Option<String>,
    pub blocks: Vec<Block>,
}

impl BlockSet {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        match serde_json::from_str::<Value>(json)? {
            Value::Array(items) => Ok(Self {
                job_id: None,
                job_status: None,
                status_message: None,
                blocks: decode_items(items),
            }),
            Value::Object(mut fields) => {
                let text_field = |name: &str| {
                    fields
                        .get(name)
                        .and_then(Value::as_str)
                        .map(str::to_string)
                };
                let job_id = text_field("JobId");
                let job_status = text_field("JobStatus");
                let status_message = text_field("StatusMessage");
                let blocks = match fields.remove("Blocks") {
                    Some(Value::Array(items)) => decode_items(items),
                    Some(Value::Null) | None if job_status.is_some() => Vec::new(),
                    Some(_) => {
                        return Err(serde_json::Error::custom("\"Blocks\" is not an array"))
                    }
                    None => {
                        return Err(serde_json::Error::custom(
                            "not a Textract response: no \"Blocks\" array and no \"JobStatus\"",
                        ))
                    }
                };
                Ok(Self {
                    job_id,
                    job_status,
                    status_message,
                    blocks,
                })
            }
            _ => Err(serde_json::Error::custom(
                "expected a Textract response object or an array of blocks",
            )),
        }
    }

    /// Whether the response records a job that did not finish successfully.
    pub fn is_unsuccessful(&self) -> bool {
        self.job_status
            .as_deref()
            .is_some_and(|status| status != "SUCCEEDED")
    }

    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }
}
