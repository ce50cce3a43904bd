//! Orchestrated analysis entry points.
//!
//! A run is strictly sequential: resolve the input, upload it, start the
//! Textract job, poll until it ends, rebuild the structured views. Any
//! failure before the last step aborts the run and nothing is returned;
//! there is no partial result.
//!
//! [`analyze`] wires up real S3 and Textract clients from the AWS config
//! chain. [`analyze_with`] takes the two collaborators as trait objects, which
//! is how the tests drive it.

use crate::blocks::{Block, BlockSet};
use crate::config::{AnalysisConfig, CellOrder};
use crate::error::AnalyzeError;
use crate::output::{AnalysisOutput, AnalysisResult, AnalysisStats};
use crate::pipeline::input;
use crate::pipeline::poll::wait_for_completion;
use crate::pipeline::storage::{object_key, ObjectStore, S3ObjectStore};
use crate::pipeline::textract::{AnalysisService, TextractService};
use crate::reconstruct::reconstruct_with;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Upload a document, analyse it with Textract and rebuild its structure.
///
/// # Arguments
/// * `input_str` — Local file path or HTTP/HTTPS URL
/// * `config`    — Analysis configuration (bucket, prefix, AWS settings, polling)
///
/// # Errors
/// Any [`AnalyzeError`]: input not found, upload failure, job submission
/// failure, job FAILED, poll budget exhausted, or cancellation.
pub async fn analyze(
    input_str: impl AsRef<str>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalyzeError> {
    let sdk_config = load_aws_config(config).await;
    let store = S3ObjectStore::from_conf(&sdk_config, config.endpoint_url.is_some());
    let service = TextractService::from_conf(&sdk_config);
    analyze_with(input_str, config, &store, &service).await
}

/// Run the full pipeline against the given storage and analysis services.
pub async fn analyze_with(
    input_str: impl AsRef<str>,
    config: &AnalysisConfig,
    store: &dyn ObjectStore,
    service: &dyn AnalysisService,
) -> Result<AnalysisOutput, AnalyzeError> {
    let total_start = Instant::now();
    let input_str = input_str.as_ref();
    info!("Starting analysis: {}", input_str);

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let document = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let bucket = config.bucket.as_str();
    let key = object_key(&document.file_name(), config.key_prefix.as_deref());

    // ── Step 2: Upload ───────────────────────────────────────────────────
    info!(
        "Uploading '{}' → s3://{}/{}",
        document.path().display(),
        bucket,
        key
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_upload_start(bucket, &key, document.size_bytes().unwrap_or(0));
    }
    let submit_failed = |e: AnalyzeError| {
        if let Some(ref cb) = config.progress_callback {
            cb.on_submit_error(bucket, &key, &e.to_string());
        }
        e
    };
    let upload_start = Instant::now();
    store
        .store(document.path(), bucket, &key)
        .await
        .map_err(submit_failed)?;
    let upload_duration_ms = upload_start.elapsed().as_millis() as u64;
    if let Some(ref cb) = config.progress_callback {
        cb.on_upload_complete(bucket, &key);
    }

    // ── Step 3: Start the job ────────────────────────────────────────────
    info!("Starting Textract job...");
    let analysis_start = Instant::now();
    let job_id = service
        .start(bucket, &key, &config.features)
        .await
        .map_err(submit_failed)?;
    info!("Textract job started: {}", job_id);
    if let Some(ref cb) = config.progress_callback {
        cb.on_job_started(&job_id);
    }

    // ── Step 4: Poll until terminal ──────────────────────────────────────
    let completed = match wait_for_completion(service, &job_id, config).await {
        Ok(completed) => completed,
        Err(e) => {
            if let Some(ref cb) = config.progress_callback {
                cb.on_job_error(&job_id, &e.to_string());
            }
            return Err(e);
        }
    };
    let analysis_duration_ms = analysis_start.elapsed().as_millis() as u64;
    info!("Fetched {} blocks", completed.blocks.len());
    if let Some(ref cb) = config.progress_callback {
        cb.on_job_complete(&job_id, completed.blocks.len());
    }

    // ── Step 5: Reconstruct ──────────────────────────────────────────────
    let result = reconstruct_with(&completed.blocks, config.cell_order);

    let stats = AnalysisStats {
        block_count: completed.blocks.len(),
        poll_attempts: completed.attempts,
        upload_duration_ms,
        analysis_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "Analysis complete: {} text items, {} key/value pairs, {} tables, {}ms total",
        result.raw_text.len(),
        result.key_values.len(),
        result.tables.len(),
        stats.total_duration_ms
    );

    Ok(AnalysisOutput {
        result,
        job_id,
        bucket: bucket.to_string(),
        key,
        stats,
    })
}

/// Analyse a document and write the result JSON directly to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn analyze_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &AnalysisConfig,
) -> Result<AnalysisStats, AnalyzeError> {
    let output = analyze(input_str, config).await?;
    write_result(&output.result, output_path.as_ref(), true).await?;
    Ok(output.stats)
}

/// Synchronous wrapper around [`analyze`].
///
/// Creates a single-threaded tokio runtime internally.
pub fn analyze_sync(
    input_str: impl AsRef<str>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalyzeError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| AnalyzeError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(analyze(input_str, config))
}

/// Rebuild the structured views from a saved Textract JSON response.
///
/// Does not touch AWS. Accepts a full `GetDocumentAnalysis` response or a
/// bare block array.
pub async fn reconstruct_file(
    path: impl AsRef<Path>,
    cell_order: CellOrder,
) -> Result<AnalysisResult, AnalyzeError> {
    let blocks = load_blocks(path.as_ref()).await?;
    Ok(reconstruct_with(&blocks, cell_order))
}

/// Read a saved Textract JSON response into a block list.
///
/// A response whose `JobStatus` is anything but `SUCCEEDED` is reported as
/// [`AnalyzeError::JobFailed`] instead of an empty result.
pub async fn load_blocks(path: &Path) -> Result<Vec<Block>, AnalyzeError> {
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AnalyzeError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    let set = BlockSet::from_json(&json).map_err(|e| AnalyzeError::BlocksParseFailed {
        path: path.to_path_buf(),
        source: e,
    })?;
    if set.is_unsuccessful() {
        let status = set.job_status.unwrap_or_default();
        return Err(AnalyzeError::JobFailed {
            job_id: set.job_id.unwrap_or_else(|| path.display().to_string()),
            message: set
                .status_message
                .or_else(|| Some(format!("job status {status}"))),
        });
    }
    let blocks = set.into_blocks();
    debug!("Loaded {} blocks from {}", blocks.len(), path.display());
    Ok(blocks)
}

/// Serialise `result` to `path` via a temp file and rename.
pub async fn write_result(
    result: &AnalysisResult,
    path: &Path,
    pretty: bool,
) -> Result<(), AnalyzeError> {
    let write_failed = |e: std::io::Error| AnalyzeError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let mut json = if pretty {
        serde_json::to_string_pretty(result)
    } else {
        serde_json::to_string(result)
    }
    .map_err(|e| AnalyzeError::Internal(format!("Failed to serialise result: {e}")))?;
    json.push('\n');

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, json).await.map_err(write_failed)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_failed)?;
    Ok(())
}

/// Load the shared AWS config, applying region/profile/endpoint overrides.
pub async fn load_aws_config(config: &AnalysisConfig) -> aws_config::SdkConfig {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if let Some(ref region) = config.region {
        loader = loader.region(aws_config::Region::new(region.clone()));
    }
    if let Some(ref profile) = config.profile {
        loader = loader.profile_name(profile);
    }
    if let Some(ref endpoint) = config.endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }
    loader.load().await
}
