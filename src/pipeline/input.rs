//! Input resolution: turn the user-supplied path or URL into a local file.
//!
//! The S3 upload streams from disk, so a URL input is first fetched into a
//! `TempDir` owned by the returned [`LocalDocument`]; the directory is removed
//! when the document is dropped. Content is not inspected: whatever bytes the
//! user points at are what Textract receives.

use crate::error::AnalyzeError;
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Name given to downloads whose URL has no usable last segment.
const FALLBACK_DOWNLOAD_NAME: &str = "downloaded.pdf";

/// Where a document comes from, before anything is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    Path(PathBuf),
    Url(Url),
}

impl DocumentSource {
    /// Classify `input`. Only `http` and `https` URLs count as remote; anything
    /// else is taken as a path.
    pub fn parse(input: &str) -> Result<Self, AnalyzeError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(AnalyzeError::InvalidInput {
                input: input.to_string(),
            });
        }
        if is_url(trimmed) {
            let url = Url::parse(trimmed).map_err(|_| AnalyzeError::InvalidInput {
                input: input.to_string(),
            })?;
            return Ok(Self::Url(url));
        }
        Ok(Self::Path(PathBuf::from(input)))
    }
}

/// A readable document on local disk.
#[derive(Debug)]
pub struct LocalDocument {
    path: PathBuf,
    /// Set for downloads; dropping it deletes the file.
    temp_dir: Option<TempDir>,
}

impl LocalDocument {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Base name used to build the object key.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| FALLBACK_DOWNLOAD_NAME.to_string())
    }

    pub fn size_bytes(&self) -> Option<u64> {
        std::fs::metadata(&self.path).ok().map(|m| m.len())
    }

    pub fn is_downloaded(&self) -> bool {
        self.temp_dir.is_some()
    }
}

pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve `input` to a local file, downloading it first if it is a URL.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<LocalDocument, AnalyzeError> {
    match DocumentSource::parse(input)? {
        DocumentSource::Path(path) => open_local(path).await,
        DocumentSource::Url(url) => fetch(url, Duration::from_secs(timeout_secs)).await,
    }
}

async fn open_local(path: PathBuf) -> Result<LocalDocument, AnalyzeError> {
    let is_file = tokio::fs::metadata(&path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);
    if !is_file {
        return Err(AnalyzeError::FileNotFound { path });
    }

    if let Err(e) = tokio::fs::File::open(&path).await {
        return Err(match e.kind() {
            std::io::ErrorKind::PermissionDenied => AnalyzeError::PermissionDenied { path },
            _ => AnalyzeError::FileNotFound { path },
        });
    }

    debug!("Resolved local document: {}", path.display());
    Ok(LocalDocument {
        path,
        temp_dir: None,
    })
}

/// Stream `url` into a fresh temp directory.
async fn fetch(url: Url, timeout: Duration) -> Result<LocalDocument, AnalyzeError> {
    info!("Downloading document from: {}", url);

    let failed = |reason: String| AnalyzeError::DownloadFailed {
        url: url.to_string(),
        reason,
    };
    let classify = |e: reqwest::Error| {
        if e.is_timeout() {
            AnalyzeError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout.as_secs(),
            }
        } else {
            failed(e.to_string())
        }
    };

    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| failed(e.to_string()))?;
    let mut response = client.get(url.clone()).send().await.map_err(classify)?;
    let status = response.status();
    if !status.is_success() {
        return Err(failed(format!("HTTP {status}")));
    }

    let temp_dir = TempDir::new().map_err(|e| AnalyzeError::Internal(e.to_string()))?;
    let path = temp_dir.path().join(download_name(&url));
    let temp_write_failed =
        |e: std::io::Error| AnalyzeError::Internal(format!("Failed to write temp file: {e}"));
    let mut file = tokio::fs::File::create(&path)
        .await
        .map_err(temp_write_failed)?;

    let mut written: u64 = 0;
    while let Some(chunk) = response.chunk().await.map_err(classify)? {
        file.write_all(&chunk).await.map_err(temp_write_failed)?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(temp_write_failed)?;

    info!("Downloaded {} bytes to: {}", written, path.display());
    Ok(LocalDocument {
        path,
        temp_dir: Some(temp_dir),
    })
}

/// Last URL path segment when it looks like a file name.
fn download_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|last| !last.is_empty() && last.contains('.'))
        .map(str::to_string)
        .unwrap_or_else(|| FALLBACK_DOWNLOAD_NAME.to_string())
}
