//! Orchestrator tests against in-memory storage and analysis fakes.
//!
//! Time is paused so the 5-second poll waits resolve instantly. Set
//! `RUST_LOG` to see the pipeline's own logging in failing tests.

use async_trait::async_trait;
use edgequake_textract::pipeline::poll::wait_for_completion;
use edgequake_textract::{
    analyze_with, AnalysisConfig, AnalysisProgressCallback, AnalysisService, AnalyzeError, Block,
    BlockType, FeatureType, JobPoll, JobStatus, ObjectStore, RelationshipType,
};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

// ── Fakes ────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeStore {
    uploads: Mutex<Vec<(PathBuf, String, String)>>,
    fail: bool,
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn store(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), AnalyzeError> {
        if self.fail {
            return Err(AnalyzeError::UploadFailed {
                bucket: bucket.to_string(),
                key: key.to_string(),
                reason: "AccessDenied".into(),
            });
        }
        self.uploads.lock().unwrap().push((
            local_path.to_path_buf(),
            bucket.to_string(),
            key.to_string(),
        ));
        Ok(())
    }
}

/// Replays a scripted sequence of polls. Once the script runs dry every
/// further check reports IN_PROGRESS.
struct ScriptedService {
    script: Mutex<VecDeque<JobPoll>>,
    starts: Mutex<Vec<(String, String, Vec<FeatureType>)>>,
    polls: Mutex<u32>,
    reject_start: bool,
}

impl ScriptedService {
    fn new(script: Vec<JobPoll>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            starts: Mutex::new(Vec::new()),
            polls: Mutex::new(0),
            reject_start: false,
        }
    }

    /// A service that refuses every job submission.
    fn rejecting() -> Self {
        Self {
            reject_start: true,
            ..Self::new(Vec::new())
        }
    }

    fn poll_count(&self) -> u32 {
        *self.polls.lock().unwrap()
    }
}

#[async_trait]
impl AnalysisService for ScriptedService {
    async fn start(
        &self,
        bucket: &str,
        key: &str,
        features: &[FeatureType],
    ) -> Result<String, AnalyzeError> {
        self.starts
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string(), features.to_vec()));
        if self.reject_start {
            return Err(AnalyzeError::StartFailed {
                bucket: bucket.to_string(),
                key: key.to_string(),
                reason: "InvalidS3ObjectException".into(),
            });
        }
        Ok("job-123".into())
    }

    async fn poll(&self, _job_id: &str) -> Result<JobPoll, AnalyzeError> {
        *self.polls.lock().unwrap() += 1;
        Ok(self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| JobPoll::pending(JobStatus::InProgress)))
    }
}

#[derive(Default)]
struct EventLog(Mutex<Vec<String>>);

impl EventLog {
    fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl AnalysisProgressCallback for EventLog {
    fn on_upload_start(&self, bucket: &str, key: &str, _size_bytes: u64) {
        self.0.lock().unwrap().push(format!("upload:{bucket}/{key}"));
    }

    fn on_upload_complete(&self, _bucket: &str, _key: &str) {
        self.0.lock().unwrap().push("uploaded".into());
    }

    fn on_submit_error(&self, bucket: &str, key: &str, _error: &str) {
        self.0.lock().unwrap().push(format!("submit-error:{bucket}/{key}"));
    }

    fn on_job_started(&self, job_id: &str) {
        self.0.lock().unwrap().push(format!("started:{job_id}"));
    }

    fn on_poll(&self, _job_id: &str, attempt: u32, status: &JobStatus) {
        self.0.lock().unwrap().push(format!("poll:{attempt}:{status}"));
    }

    fn on_job_complete(&self, _job_id: &str, block_count: usize) {
        self.0.lock().unwrap().push(format!("complete:{block_count}"));
    }

    fn on_job_error(&self, _job_id: &str, _error: &str) {
        self.0.lock().unwrap().push("error".into());
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("edgequake_textract=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

fn logged_config(log: &Arc<EventLog>) -> AnalysisConfig {
    AnalysisConfig::builder()
        .bucket("docs-bucket")
        .progress_callback(log.clone())
        .build()
        .unwrap()
}

fn sample_pdf() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("invoice.pdf");
    std::fs::write(&path, b"%PDF-1.4\n%fake\n").unwrap();
    (dir, path)
}

fn form_blocks() -> Vec<Block> {
    vec![
        Block::new("k", BlockType::KeyValueSet)
            .with_entity(edgequake_textract::EntityType::Key)
            .with_relationship(RelationshipType::Child, &["w1"])
            .with_relationship(RelationshipType::Value, &["v"]),
        Block::word("w1", "Total"),
        Block::new("v", BlockType::KeyValueSet)
            .with_entity(edgequake_textract::EntityType::Value)
            .with_relationship(RelationshipType::Child, &["w2"]),
        Block::word("w2", "42.00"),
    ]
}

fn succeeded(blocks: Vec<Block>) -> JobPoll {
    JobPoll {
        status: JobStatus::Succeeded,
        status_message: None,
        blocks,
    }
}

fn config() -> AnalysisConfig {
    AnalysisConfig::builder().bucket("docs-bucket").build().unwrap()
}

// ── Full runs ────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn successful_run_uploads_polls_and_reconstructs() {
    init_tracing();
    let (_dir, pdf) = sample_pdf();
    let store = FakeStore::default();
    let service = ScriptedService::new(vec![
        JobPoll::pending(JobStatus::InProgress),
        JobPoll::pending(JobStatus::InProgress),
        succeeded(form_blocks()),
    ]);

    let output = assert_ok!(
        analyze_with(pdf.to_str().unwrap(), &config(), &store, &service).await
    );

    assert_eq!(output.job_id, "job-123");
    assert_eq!(output.bucket, "docs-bucket");
    assert_eq!(output.key, "invoice.pdf");
    assert_eq!(output.stats.poll_attempts, 3);
    assert_eq!(output.stats.block_count, 4);
    assert_eq!(output.result.key_values.len(), 1);
    assert_eq!(output.result.key_values[0].key, "Total");
    assert_eq!(output.result.key_values[0].value, "42.00");

    let uploads = store.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].0, pdf);
    assert_eq!(uploads[0].2, "invoice.pdf");

    let starts = service.starts.lock().unwrap();
    assert_eq!(
        starts[0],
        (
            "docs-bucket".to_string(),
            "invoice.pdf".to_string(),
            vec![FeatureType::Forms, FeatureType::Tables]
        )
    );
}

#[tokio::test(start_paused = true)]
async fn prefix_is_joined_onto_object_key() {
    let (_dir, pdf) = sample_pdf();
    let store = FakeStore::default();
    let service = ScriptedService::new(vec![succeeded(Vec::new())]);
    let config = AnalysisConfig::builder()
        .bucket("docs-bucket")
        .key_prefix("incoming/2024/")
        .build()
        .unwrap();

    let output = analyze_with(pdf.to_str().unwrap(), &config, &store, &service)
        .await
        .unwrap();

    assert_eq!(output.key, "incoming/2024/invoice.pdf");
    assert!(output.result.is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_job_yields_error_and_no_result() {
    init_tracing();
    let (_dir, pdf) = sample_pdf();
    let store = FakeStore::default();
    let service = ScriptedService::new(vec![
        JobPoll::pending(JobStatus::InProgress),
        JobPoll {
            status: JobStatus::Failed,
            status_message: Some("UNSUPPORTED_DOCUMENT".into()),
            blocks: Vec::new(),
        },
    ]);
    let log = Arc::new(EventLog::default());

    let config = logged_config(&log);

    let err = assert_err!(analyze_with(pdf.to_str().unwrap(), &config, &store, &service).await);

    match err {
        AnalyzeError::JobFailed { job_id, message } => {
            assert_eq!(job_id, "job-123");
            assert_eq!(message.as_deref(), Some("UNSUPPORTED_DOCUMENT"));
        }
        other => panic!("expected JobFailed, got {other:?}"),
    }
    assert_eq!(service.poll_count(), 2);
    let events = log.events();
    assert_eq!(events.last().map(String::as_str), Some("error"));
    assert!(!events.iter().any(|e| e.starts_with("complete")));
}

#[tokio::test(start_paused = true)]
async fn upload_failure_stops_before_job_start() {
    init_tracing();
    let (_dir, pdf) = sample_pdf();
    let store = FakeStore {
        fail: true,
        ..Default::default()
    };
    let service = ScriptedService::new(vec![succeeded(Vec::new())]);
    let log = Arc::new(EventLog::default());

    let config = logged_config(&log);

    let err = assert_err!(analyze_with(pdf.to_str().unwrap(), &config, &store, &service).await);

    assert!(matches!(err, AnalyzeError::UploadFailed { .. }));
    assert!(service.starts.lock().unwrap().is_empty());
    assert_eq!(service.poll_count(), 0);
    assert_eq!(
        log.events(),
        vec![
            "upload:docs-bucket/invoice.pdf",
            "submit-error:docs-bucket/invoice.pdf",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn rejected_submission_is_reported_to_callback() {
    init_tracing();
    let (_dir, pdf) = sample_pdf();
    let store = FakeStore::default();
    let service = ScriptedService::rejecting();
    let log = Arc::new(EventLog::default());

    let config = logged_config(&log);

    let err = assert_err!(analyze_with(pdf.to_str().unwrap(), &config, &store, &service).await);

    assert!(matches!(err, AnalyzeError::StartFailed { .. }), "{err:?}");
    assert_eq!(service.poll_count(), 0);
    assert_eq!(
        log.events().last().map(String::as_str),
        Some("submit-error:docs-bucket/invoice.pdf")
    );
    assert!(!log.events().iter().any(|e| e.starts_with("started")));
}

#[tokio::test(start_paused = true)]
async fn missing_input_fails_before_upload() {
    let store = FakeStore::default();
    let service = ScriptedService::new(Vec::new());

    let err = analyze_with("/no/such/document.pdf", &config(), &store, &service)
        .await
        .unwrap_err();

    assert!(matches!(err, AnalyzeError::FileNotFound { .. }));
    assert!(store.uploads.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn callback_sees_every_stage_in_order() {
    let (_dir, pdf) = sample_pdf();
    let store = FakeStore::default();
    let service = ScriptedService::new(vec![
        JobPoll::pending(JobStatus::InProgress),
        succeeded(form_blocks()),
    ]);
    let log = Arc::new(EventLog::default());

    let config = logged_config(&log);

    assert_ok!(analyze_with(pdf.to_str().unwrap(), &config, &store, &service).await);

    assert_eq!(
        log.events(),
        vec![
            "upload:docs-bucket/invoice.pdf",
            "uploaded",
            "started:job-123",
            "poll:1:IN_PROGRESS",
            "poll:2:SUCCEEDED",
            "complete:4",
        ]
    );
}

// ── Polling policy ───────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn poll_budget_exhaustion_times_out() {
    let service = ScriptedService::new(Vec::new());
    let config = AnalysisConfig::builder()
        .bucket("docs-bucket")
        .poll_interval(Duration::from_secs(5))
        .max_poll_attempts(4)
        .build()
        .unwrap();

    let err = assert_err!(wait_for_completion(&service, "job-123", &config).await);

    match err {
        AnalyzeError::JobTimedOut {
            attempts,
            elapsed_secs,
            ..
        } => {
            assert_eq!(attempts, 4);
            // Three waits between four checks; no wait after the last one.
            assert_eq!(elapsed_secs, 15);
        }
        other => panic!("expected JobTimedOut, got {other:?}"),
    }
    assert_eq!(service.poll_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn partial_success_keeps_polling() {
    let service = ScriptedService::new(vec![
        JobPoll::pending(JobStatus::PartialSuccess),
        JobPoll::pending(JobStatus::Unknown("QUEUED".into())),
        succeeded(form_blocks()),
    ]);

    let completed = assert_ok!(wait_for_completion(&service, "job-123", &config()).await);

    assert_eq!(completed.attempts, 3);
    assert_eq!(completed.blocks.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_wait() {
    let service = ScriptedService::new(Vec::new());
    let token = CancellationToken::new();
    let config = AnalysisConfig::builder()
        .bucket("docs-bucket")
        .cancellation_token(token.clone())
        .build()
        .unwrap();

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(12)).await;
        token.cancel();
    });

    let err = wait_for_completion(&service, "job-123", &config)
        .await
        .unwrap_err();
    canceller.await.unwrap();

    assert!(matches!(err, AnalyzeError::Cancelled { ref job_id } if job_id == "job-123"));
    // Checks at t=0, 5 and 10; cancelled during the wait that follows.
    assert_eq!(service.poll_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn already_cancelled_token_skips_polling() {
    let service = ScriptedService::new(vec![succeeded(Vec::new())]);
    let token = CancellationToken::new();
    token.cancel();
    let config = AnalysisConfig::builder()
        .bucket("docs-bucket")
        .cancellation_token(token)
        .build()
        .unwrap();

    let err = wait_for_completion(&service, "job-123", &config)
        .await
        .unwrap_err();

    assert!(matches!(err, AnalyzeError::Cancelled { .. }));
    assert_eq!(service.poll_count(), 0);
}
