//! Object storage: put the document where Textract can read it.
//!
//! Asynchronous Textract analysis only accepts documents that already live
//! in S3, so every run starts with an upload. The object key is derived from
//! the document's file name and an optional prefix by [`object_key`].

use crate::error::AnalyzeError;
use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::path::Path;
use tracing::{debug, info};

/// The object-storage collaborator.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store the file at `local_path` as `s3://bucket/key`.
    async fn store(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), AnalyzeError>;
}

/// [`ObjectStore`] backed by Amazon S3 (or any S3-compatible endpoint).
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from a loaded AWS config.
    ///
    /// Path-style addressing is forced when an endpoint override is set, as
    /// MinIO and LocalStack require it.
    pub fn from_conf(config: &aws_config::SdkConfig, custom_endpoint: bool) -> Self {
        let s3_config = aws_sdk_s3::config::Builder::from(config)
            .force_path_style(custom_endpoint)
            .build();
        Self::new(Client::from_conf(s3_config))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn store(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), AnalyzeError> {
        let upload_failed = |reason: String| AnalyzeError::UploadFailed {
            bucket: bucket.to_string(),
            key: key.to_string(),
            reason,
        };

        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| upload_failed(e.to_string()))?;

        debug!("PutObject s3://{}/{} from {}", bucket, key, local_path.display());
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type_for(local_path))
            .body(body)
            .send()
            .await
            .map_err(|e| upload_failed(DisplayErrorContext(&e).to_string()))?;

        info!("Uploaded {} → s3://{}/{}", local_path.display(), bucket, key);
        Ok(())
    }
}

/// Derive the object key for an uploaded file.
///
/// Trailing slashes are stripped from the prefix and a single `/` joins it to
/// the file name, so `"docs"`, `"docs/"` and `"docs//"` all give
/// `"docs/report.pdf"`. An empty prefix (or one made only of slashes) yields
/// the bare file name.
pub fn object_key(file_name: &str, prefix: Option<&str>) -> String {
    match prefix.map(|p| p.trim_end_matches('/')) {
        Some(p) if !p.is_empty() => format!("{p}/{file_name}"),
        _ => file_name.to_string(),
    }
}

/// MIME type Textract expects for the supported document formats.
fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("tif") | Some("tiff") => "image/tiff",
        _ => "application/octet-stream",
    }
}
