//! Rebuild document structure from Textract's flat block graph.
//!
//! ## Approach
//!
//! Blocks are indexed once by id ([`BlockIndex`]) and the three views are
//! produced by independent read-only passes over the original block order:
//!
//! ```text
//! blocks ──▶ BlockIndex ──┬─▶ raw text   WORD / LINE copied verbatim
//!                         ├─▶ key/value  KEY set ─CHILD▶ WORDs, ─VALUE▶ set ─CHILD▶ WORDs
//!                         └─▶ tables     TABLE ─CHILD▶ CELL ─CHILD▶ WORDs
//! ```
//!
//! Edges are followed by id lookup, never by holding references between
//! blocks, so the graph can contain cycles or dangling ids without harm.
//! A target id that does not resolve is skipped; a block missing optional
//! fields yields output with those fields absent. Nothing in this module
//! returns an error.

use crate::blocks::{Block, BlockType, EntityType, RelationshipType};
use crate::config::CellOrder;
use crate::output::{AnalysisResult, Cell, KeyValuePair, PairConfidence, Table, TextItem};
use std::collections::HashMap;
use tracing::debug;

/// Id → block lookup over a borrowed block list.
///
/// When two blocks share an id the later one wins.
pub struct BlockIndex<'a> {
    by_id: HashMap<&'a str, &'a Block>,
}

impl<'a> BlockIndex<'a> {
    pub fn new(blocks: &'a [Block]) -> Self {
        let by_id = blocks.iter().map(|b| (b.id.as_str(), b)).collect();
        Self { by_id }
    }

    pub fn get(&self, id: &str) -> Option<&'a Block> {
        let block = self.by_id.get(id).copied();
        if block.is_none() {
            debug!("Dangling block reference: {}", id);
        }
        block
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Resolved `CHILD` targets of `block`, skipping ids that do not resolve.
    pub fn children(&self, block: &'a Block) -> impl Iterator<Item = &'a Block> + '_ {
        block
            .related_ids(RelationshipType::Child)
            .filter_map(move |id| self.get(id))
    }

    /// Text of the `WORD` children of `block`, space-joined and trimmed.
    pub fn word_text(&self, block: &'a Block) -> String {
        let words: Vec<&str> = self
            .children(block)
            .filter(|child| child.block_type == BlockType::Word)
            .map(|word| word.text.as_deref().unwrap_or(""))
            .collect();
        words.join(" ").trim().to_string()
    }
}

/// Rebuild all three views, keeping table cells in relationship order.
pub fn reconstruct(blocks: &[Block]) -> AnalysisResult {
    reconstruct_with(blocks, CellOrder::default())
}

/// Rebuild all three views with an explicit table cell order.
pub fn reconstruct_with(blocks: &[Block], cell_order: CellOrder) -> AnalysisResult {
    let index = BlockIndex::new(blocks);
    let result = AnalysisResult {
        raw_text: extract_text(blocks),
        key_values: extract_key_values(blocks, &index),
        tables: extract_tables(blocks, &index, cell_order),
    };
    debug!(
        "Reconstructed {} text items, {} key/value pairs, {} tables from {} blocks",
        result.raw_text.len(),
        result.key_values.len(),
        result.tables.len(),
        blocks.len()
    );
    result
}

fn extract_text(blocks: &[Block]) -> Vec<TextItem> {
    blocks
        .iter()
        .filter(|b| b.block_type.is_text())
        .map(|b| TextItem {
            text: b.text.clone().unwrap_or_default(),
            kind: b.block_type,
            page: b.page,
            confidence: b.confidence,
            bounding_box: b.bounding_box(),
        })
        .collect()
}

fn extract_key_values<'a>(blocks: &'a [Block], index: &BlockIndex<'a>) -> Vec<KeyValuePair> {
    blocks
        .iter()
        .filter(|b| b.block_type == BlockType::KeyValueSet && b.has_entity(EntityType::Key))
        .filter_map(|key_block| {
            let key = index.word_text(key_block);

            // No VALUE edge, or one whose target cannot be found: no pair.
            let value_block = key_block
                .relationship(RelationshipType::Value)?
                .ids
                .first()
                .and_then(|id| index.get(id))?;

            Some(KeyValuePair {
                key,
                value: index.word_text(value_block),
                key_box: key_block.bounding_box(),
                value_box: value_block.bounding_box(),
                confidence: PairConfidence {
                    key: key_block.confidence,
                    value: value_block.confidence,
                },
            })
        })
        .collect()
}

fn extract_tables<'a>(
    blocks: &'a [Block],
    index: &BlockIndex<'a>,
    cell_order: CellOrder,
) -> Vec<Table> {
    blocks
        .iter()
        .filter(|b| b.block_type == BlockType::Table)
        .map(|table| {
            let mut cells: Vec<Cell> = index
                .children(table)
                .filter(|child| child.block_type == BlockType::Cell)
                .map(|cell| Cell {
                    row: cell.row_index,
                    column: cell.column_index,
                    text: index.word_text(cell),
                    bounding_box: cell.bounding_box(),
                    confidence: cell.confidence,
                })
                .collect();
            if cell_order == CellOrder::RowMajor {
                sort_row_major(&mut cells);
            }
            Table {
                page: table.page,
                cells,
            }
        })
        .collect()
}

/// Stable sort by (row, column); cells without an index go last.
fn sort_row_major(cells: &mut [Cell]) {
    cells.sort_by_key(|c| {
        (
            c.row.is_none(),
            c.row.unwrap_or(0),
            c.column.is_none(),
            c.column.unwrap_or(0),
        )
    });
}
