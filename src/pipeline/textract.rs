//! Textract: start an asynchronous document analysis and read its status.
//!
//! [`AnalysisService`] is the seam the orchestrator talks to. The production
//! implementation, [`TextractService`], wraps `StartDocumentAnalysis` and
//! `GetDocumentAnalysis`. Tests swap in an in-memory fake.
//!
//! ## Result paging
//!
//! `GetDocumentAnalysis` returns at most 1000 blocks per call and a
//! `NextToken` when more remain. Once a job has SUCCEEDED, [`TextractService::poll`]
//! follows the tokens to the end so callers always see the full block list.
//! A failure on any later page fails the whole poll; blocks are never
//! returned from a partial read.

use crate::blocks::{
    Block, BlockType, BoundingBox, EntityType, Geometry, Relationship, RelationshipType,
};
use crate::config::FeatureType;
use crate::error::AnalyzeError;
use async_trait::async_trait;
use aws_sdk_textract::error::DisplayErrorContext;
use aws_sdk_textract::operation::get_document_analysis::GetDocumentAnalysisOutput;
use aws_sdk_textract::types::{self as sdk, DocumentLocation, S3Object};
use aws_sdk_textract::Client;
use std::fmt;
use std::future::Future;
use tracing::{debug, info, warn};

/// Status of an asynchronous Textract job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    InProgress,
    Succeeded,
    Failed,
    PartialSuccess,
    /// A status string this crate does not know.
    Unknown(String),
}

impl JobStatus {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "IN_PROGRESS" => JobStatus::InProgress,
            "SUCCEEDED" => JobStatus::Succeeded,
            "FAILED" => JobStatus::Failed,
            "PARTIAL_SUCCESS" => JobStatus::PartialSuccess,
            other => JobStatus::Unknown(other.to_string()),
        }
    }

    /// SUCCEEDED and FAILED end polling; everything else keeps it going.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::InProgress => f.write_str("IN_PROGRESS"),
            JobStatus::Succeeded => f.write_str("SUCCEEDED"),
            JobStatus::Failed => f.write_str("FAILED"),
            JobStatus::PartialSuccess => f.write_str("PARTIAL_SUCCESS"),
            JobStatus::Unknown(s) => f.write_str(s),
        }
    }
}

/// One status check. `blocks` is only populated once the job SUCCEEDED.
#[derive(Debug, Clone, PartialEq)]
pub struct JobPoll {
    pub status: JobStatus,
    pub status_message: Option<String>,
    pub blocks: Vec<Block>,
}

impl JobPoll {
    pub fn pending(status: JobStatus) -> Self {
        Self {
            status,
            status_message: None,
            blocks: Vec::new(),
        }
    }
}

/// The document-analysis collaborator.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Start an analysis of `s3://bucket/key`, returning the job id.
    async fn start(
        &self,
        bucket: &str,
        key: &str,
        features: &[FeatureType],
    ) -> Result<String, AnalyzeError>;

    /// Check a job's status, fetching all blocks if it has succeeded.
    async fn poll(&self, job_id: &str) -> Result<JobPoll, AnalyzeError>;
}

/// [`AnalysisService`] backed by the AWS Textract API.
#[derive(Debug, Clone)]
pub struct TextractService {
    client: Client,
}

impl TextractService {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from a loaded AWS config (see [`crate::analyze::load_aws_config`]).
    pub fn from_conf(config: &aws_config::SdkConfig) -> Self {
        Self::new(Client::new(config))
    }

    async fn fetch_page(
        &self,
        job_id: &str,
        next_token: Option<String>,
    ) -> Result<GetDocumentAnalysisOutput, AnalyzeError> {
        self.client
            .get_document_analysis()
            .job_id(job_id)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| AnalyzeError::StatusCheckFailed {
                job_id: job_id.to_string(),
                reason: DisplayErrorContext(&e).to_string(),
            })
    }
}

#[async_trait]
impl AnalysisService for TextractService {
    async fn start(
        &self,
        bucket: &str,
        key: &str,
        features: &[FeatureType],
    ) -> Result<String, AnalyzeError> {
        let start_failed = |reason: String| AnalyzeError::StartFailed {
            bucket: bucket.to_string(),
            key: key.to_string(),
            reason,
        };

        let location = DocumentLocation::builder()
            .s3_object(S3Object::builder().bucket(bucket).name(key).build())
            .build();
        let feature_types: Vec<sdk::FeatureType> = features
            .iter()
            .map(|f| sdk::FeatureType::from(f.as_str()))
            .collect();

        let response = self
            .client
            .start_document_analysis()
            .document_location(location)
            .set_feature_types(Some(feature_types))
            .send()
            .await
            .map_err(|e| start_failed(DisplayErrorContext(&e).to_string()))?;

        response
            .job_id()
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or_else(|| start_failed("response carried no job id".into()))
    }

    async fn poll(&self, job_id: &str) -> Result<JobPoll, AnalyzeError> {
        let first = self.fetch_page(job_id, None).await?;
        let status = first
            .job_status()
            .map(|s| JobStatus::from_tag(s.as_str()))
            .unwrap_or_else(|| JobStatus::Unknown("<none>".into()));
        let status_message = first.status_message().map(str::to_string);

        if status != JobStatus::Succeeded {
            return Ok(JobPoll {
                status,
                status_message,
                blocks: Vec::new(),
            });
        }

        let blocks = collect_result_pages(job_id, first, |token| {
            self.fetch_page(job_id, Some(token))
        })
        .await?;
        Ok(JobPoll {
            status,
            status_message,
            blocks,
        })
    }
}

/// Gather the blocks of `first` and of every page its `NextToken` chain
/// leads to, in page order. `fetch_next` is called once per token.
async fn collect_result_pages<F, Fut>(
    job_id: &str,
    first: GetDocumentAnalysisOutput,
    mut fetch_next: F,
) -> Result<Vec<Block>, AnalyzeError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<GetDocumentAnalysisOutput, AnalyzeError>>,
{
    log_warnings(job_id, first.warnings());
    let mut blocks: Vec<Block> = first.blocks().iter().map(block_from_sdk).collect();
    let mut next_token = first.next_token().map(str::to_string);
    let mut pages = 1;

    while let Some(token) = next_token.take() {
        let page = fetch_next(token).await?;
        pages += 1;
        debug!(
            "Job {}: result page {} with {} blocks",
            job_id,
            pages,
            page.blocks().len()
        );
        log_warnings(job_id, page.warnings());
        blocks.extend(page.blocks().iter().map(block_from_sdk));
        next_token = page.next_token().map(str::to_string);
    }

    info!("Fetched {} blocks in {} result pages", blocks.len(), pages);
    Ok(blocks)
}

fn log_warnings(job_id: &str, warnings: &[sdk::Warning]) {
    for w in warnings {
        warn!(
            "Job {}: Textract warning {} on pages {:?}",
            job_id,
            w.error_code().unwrap_or("<unknown>"),
            w.pages()
        );
    }
}

/// Convert an SDK block into the crate's own block model.
///
/// Mirrors the JSON deserialisation in [`crate::blocks`]: unknown tags map to
/// `Other`, negative indices and page numbers are dropped.
pub fn block_from_sdk(b: &sdk::Block) -> Block {
    let non_negative = |v: Option<i32>| v.and_then(|n| u32::try_from(n).ok());
    Block {
        id: b.id().unwrap_or_default().to_string(),
        block_type: b
            .block_type()
            .map(|t| BlockType::from_tag(t.as_str()))
            .unwrap_or_default(),
        text: b.text().map(str::to_string),
        page: non_negative(b.page()),
        confidence: b.confidence(),
        geometry: b.geometry().map(|g| Geometry {
            bounding_box: g.bounding_box().map(|bb| BoundingBox {
                width: bb.width(),
                height: bb.height(),
                left: bb.left(),
                top: bb.top(),
            }),
        }),
        entity_types: b
            .entity_types()
            .iter()
            .map(|e| EntityType::from_tag(e.as_str()))
            .collect(),
        relationships: b
            .relationships()
            .iter()
            .map(|r| Relationship {
                kind: r
                    .r#type()
                    .map(|t| RelationshipType::from_tag(t.as_str()))
                    .unwrap_or_default(),
                ids: r.ids().to_vec(),
            })
            .collect(),
        row_index: non_negative(b.row_index()),
        column_index: non_negative(b.column_index()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[test]
    fn status_parsing_and_terminality() {
        assert_eq!(JobStatus::from_tag("SUCCEEDED"), JobStatus::Succeeded);
        assert_eq!(JobStatus::from_tag("FAILED"), JobStatus::Failed);
        assert_eq!(JobStatus::from_tag("IN_PROGRESS"), JobStatus::InProgress);
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::InProgress.is_terminal());
        assert!(!JobStatus::PartialSuccess.is_terminal());
        assert!(!JobStatus::from_tag("QUEUED").is_terminal());
    }

    #[test]
    fn status_display_round_trips_tag() {
        for tag in ["IN_PROGRESS", "SUCCEEDED", "FAILED", "PARTIAL_SUCCESS", "QUEUED"] {
            assert_eq!(JobStatus::from_tag(tag).to_string(), tag);
        }
    }

    #[test]
    fn sdk_block_conversion() {
        let sdk_block = sdk::Block::builder()
            .id("c1")
            .block_type(sdk::BlockType::Cell)
            .confidence(91.5)
            .page(3)
            .row_index(2)
            .column_index(1)
            .geometry(
                sdk::Geometry::builder()
                    .bounding_box(
                        sdk::BoundingBox::builder()
                            .width(0.5)
                            .height(0.1)
                            .left(0.2)
                            .top(0.4)
                            .build(),
                    )
                    .build(),
            )
            .relationships(
                sdk::Relationship::builder()
                    .r#type(sdk::RelationshipType::Child)
                    .ids("w1")
                    .ids("w2")
                    .build(),
            )
            .relationships(
                sdk::Relationship::builder()
                    .r#type(sdk::RelationshipType::MergedCell)
                    .ids("m1")
                    .build(),
            )
            .build();

        let block = block_from_sdk(&sdk_block);
        assert_eq!(block.id, "c1");
        assert_eq!(block.block_type, BlockType::Cell);
        assert_eq!(block.page, Some(3));
        assert_eq!(block.row_index, Some(2));
        assert_eq!(block.column_index, Some(1));
        assert_eq!(block.confidence, Some(91.5));
        assert_eq!(block.bounding_box().unwrap().width, 0.5);
        assert_eq!(block.relationships[0].kind, RelationshipType::Child);
        assert_eq!(block.relationships[0].ids, vec!["w1", "w2"]);
        assert_eq!(block.relationships[1].kind, RelationshipType::Other);
    }

    #[test]
    fn sdk_block_without_optionals() {
        let block = block_from_sdk(&sdk::Block::builder().build());
        assert_eq!(block.id, "");
        assert_eq!(block.block_type, BlockType::Other);
        assert!(block.geometry.is_none());
        assert!(block.entity_types.is_empty());
    }

    fn result_page(words: &[&str], next_token: Option<&str>) -> GetDocumentAnalysisOutput {
        let mut page = GetDocumentAnalysisOutput::builder()
            .job_status(sdk::JobStatus::Succeeded)
            .set_next_token(next_token.map(str::to_string));
        for word in words {
            page = page.blocks(
                sdk::Block::builder()
                    .id(*word)
                    .block_type(sdk::BlockType::Word)
                    .text(*word)
                    .build(),
            );
        }
        page.build()
    }

    #[tokio::test]
    async fn result_pages_are_followed_in_order() {
        let mut later = VecDeque::from([
            result_page(&["c", "d"], Some("t3")),
            result_page(&["e"], None),
        ]);
        let mut requested = Vec::new();

        let blocks = collect_result_pages("job-1", result_page(&["a", "b"], Some("t2")), |token| {
            requested.push(token);
            let page = later.pop_front().ok_or_else(|| AnalyzeError::StatusCheckFailed {
                job_id: "job-1".into(),
                reason: "asked for a page past the last one".into(),
            });
            async move { page }
        })
        .await
        .unwrap();

        let ids: Vec<&str> = blocks.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(requested, vec!["t2", "t3"]);
        assert!(later.is_empty());
    }

    #[tokio::test]
    async fn single_page_needs_no_further_requests() {
        let mut calls = 0;
        let blocks = collect_result_pages("job-1", result_page(&["a"], None), |_| {
            calls += 1;
            async { Ok(result_page(&[], None)) }
        })
        .await
        .unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn failure_on_later_page_fails_the_read() {
        let mut later = VecDeque::from([
            Ok(result_page(&["c"], Some("t3"))),
            Err(AnalyzeError::StatusCheckFailed {
                job_id: "job-1".into(),
                reason: "ThrottlingException".into(),
            }),
            Ok(result_page(&["z"], None)),
        ]);
        let mut requested = Vec::new();

        let err = collect_result_pages("job-1", result_page(&["a"], Some("t2")), |token| {
            requested.push(token);
            let page = later
                .pop_front()
                .unwrap_or_else(|| Ok(result_page(&[], None)));
            async move { page }
        })
        .await
        .unwrap_err();

        assert!(
            matches!(err, AnalyzeError::StatusCheckFailed { ref reason, .. } if reason == "ThrottlingException")
        );
        assert_eq!(requested, vec!["t2", "t3"]);
        // The page after the failure is never requested.
        assert_eq!(later.len(), 1);
    }
}
