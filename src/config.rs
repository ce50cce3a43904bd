//! Configuration types for document analysis.
//!
//! All run behaviour is controlled through [`AnalysisConfig`], built via its
//! [`AnalysisConfigBuilder`]. Only the bucket is required; AWS credentials and
//! region fall back to the standard provider chain (`AWS_PROFILE`,
//! `AWS_REGION`, environment credentials, SSO, instance metadata) when not set
//! here.

use crate::error::AnalyzeError;
use crate::progress::ProgressCallback;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// S3 bucket naming rules: 3–63 chars, lowercase letters, digits, dots and
/// hyphens, starting and ending with a letter or digit.
static BUCKET_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$").expect("valid regex"));

/// Configuration for one upload → analyse → reconstruct run.
///
/// # Example
/// ```rust
/// use edgequake_textract::AnalysisConfig;
///
/// let config = AnalysisConfig::builder()
///     .bucket("my-documents")
///     .key_prefix("incoming/")
///     .region("eu-west-1")
///     .build()
///     .unwrap();
/// assert_eq!(config.poll.interval.as_secs(), 5);
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// Bucket the document is uploaded to and Textract reads from.
    pub bucket: String,

    /// Optional key prefix, e.g. `"incoming/"`. See [`crate::pipeline::storage::object_key`].
    pub key_prefix: Option<String>,

    /// AWS region. If None, taken from the environment/profile.
    pub region: Option<String>,

    /// Named AWS profile. If None, `AWS_PROFILE` or the default profile is used.
    pub profile: Option<String>,

    /// Endpoint override for both S3 and Textract (LocalStack and similar).
    pub endpoint_url: Option<String>,

    /// Textract analysis features. Default: forms + tables.
    pub features: Vec<FeatureType>,

    /// How often and how long to poll the job. Default: every 5 s, 360 times.
    pub poll: PollPolicy,

    /// Order of cells within each reconstructed table. Default: traversal order.
    pub cell_order: CellOrder,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional progress callback for upload and polling events.
    pub progress_callback: Option<ProgressCallback>,

    /// Cancelling this token stops polling with [`AnalyzeError::Cancelled`].
    ///
    /// The remote job keeps running; Textract has no cancel call for
    /// asynchronous analysis.
    pub cancellation_token: CancellationToken,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            key_prefix: None,
            region: None,
            profile: None,
            endpoint_url: None,
            features: FeatureType::defaults(),
            poll: PollPolicy::default(),
            cell_order: CellOrder::default(),
            download_timeout_secs: 120,
            progress_callback: None,
            cancellation_token: CancellationToken::new(),
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("bucket", &self.bucket)
            .field("key_prefix", &self.key_prefix)
            .field("region", &self.region)
            .field("profile", &self.profile)
            .field("endpoint_url", &self.endpoint_url)
            .field("features", &self.features)
            .field("poll", &self.poll)
            .field("cell_order", &self.cell_order)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn AnalysisProgressCallback>"),
            )
            .field("cancelled", &self.cancellation_token.is_cancelled())
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AnalysisConfig`].
#[derive(Debug)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.config.bucket = bucket.into();
        self
    }

    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.key_prefix = Some(prefix.into());
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.config.region = Some(region.into());
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config.profile = Some(profile.into());
        self
    }

    pub fn endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint_url = Some(url.into());
        self
    }

    pub fn features(mut self, features: Vec<FeatureType>) -> Self {
        self.config.features = features;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll.interval = interval;
        self
    }

    pub fn max_poll_attempts(mut self, n: u32) -> Self {
        self.config.poll.max_attempts = n;
        self
    }

    pub fn cell_order(mut self, order: CellOrder) -> Self {
        self.config.cell_order = order;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.config.cancellation_token = token;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalysisConfig, AnalyzeError> {
        let c = &self.config;
        if c.bucket.is_empty() {
            return Err(AnalyzeError::InvalidConfig("Bucket name is required".into()));
        }
        if !BUCKET_NAME.is_match(&c.bucket) {
            return Err(AnalyzeError::InvalidConfig(format!(
                "'{}' is not a valid S3 bucket name",
                c.bucket
            )));
        }
        if c.features.is_empty() {
            return Err(AnalyzeError::InvalidConfig(
                "At least one analysis feature is required".into(),
            ));
        }
        if c.poll.interval.is_zero() {
            return Err(AnalyzeError::InvalidConfig(
                "Poll interval must be > 0".into(),
            ));
        }
        if c.poll.max_attempts == 0 {
            return Err(AnalyzeError::InvalidConfig(
                "Max poll attempts must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Textract analysis feature requested at job submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureType {
    Forms,
    Tables,
}

impl FeatureType {
    /// Forms and tables, the set the reconstructor makes use of.
    pub fn defaults() -> Vec<FeatureType> {
        vec![FeatureType::Forms, FeatureType::Tables]
    }

    /// Wire name, e.g. `"FORMS"`.
    pub fn as_str(self) -> &'static str {
        match self {
            FeatureType::Forms => "FORMS",
            FeatureType::Tables => "TABLES",
        }
    }
}

/// Order of cells inside each reconstructed table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CellOrder {
    /// As Textract lists them in the table's `CHILD` edges. (default)
    #[default]
    Traversal,
    /// Sorted by row, then column.
    RowMajor,
}

/// Bounded polling schedule for an analysis job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Wait between status checks. Default: 5 s.
    pub interval: Duration,
    /// Status checks before giving up with [`AnalyzeError::JobTimedOut`]. Default: 360.
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 360,
        }
    }
}

impl PollPolicy {
    /// Longest time a run can spend waiting between checks.
    pub fn max_wait(&self) -> Duration {
        self.interval * self.max_attempts.saturating_sub(1)
    }
}
