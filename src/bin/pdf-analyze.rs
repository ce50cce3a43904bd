//! CLI binary for edgequake-textract.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `AnalysisConfig` and prints the result JSON to stdout.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_textract::analyze::write_result;
use edgequake_textract::{
    analyze, reconstruct_file, AnalysisConfig, AnalysisProgressCallback, AnalysisResult,
    AnalysisStats, CellOrder, FeatureType, JobStatus, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner showing the current stage and the
/// latest job status, with one log line per completed stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_upload_start(&self, bucket: &str, key: &str, size_bytes: u64) {
        self.bar.set_message(format!(
            "Uploading {} to s3://{bucket}/{key}",
            dim(&format!("{:.1} KiB", size_bytes as f64 / 1024.0))
        ));
    }

    fn on_upload_complete(&self, bucket: &str, key: &str) {
        self.bar
            .println(format!("  {} Uploaded s3://{bucket}/{key}", green("✓")));
        self.bar.set_message("Starting Textract job…");
    }

    fn on_submit_error(&self, bucket: &str, key: &str, error: &str) {
        self.bar.finish_and_clear();
        let first_line = error.lines().next().unwrap_or(error);
        eprintln!("{} s3://{bucket}/{key}: {}", red("✘"), red(first_line));
    }

    fn on_job_started(&self, job_id: &str) {
        self.bar
            .println(format!("  {} Job {}", green("✓"), dim(job_id)));
        self.bar.set_message("Waiting for Textract…");
    }

    fn on_poll(&self, _job_id: &str, attempt: u32, status: &JobStatus) {
        self.bar.set_message(format!(
            "Textract job status: {}  {}",
            bold(&status.to_string()),
            dim(&format!("check {attempt}"))
        ));
    }

    fn on_job_complete(&self, _job_id: &str, block_count: usize) {
        self.bar.finish_and_clear();
        eprintln!("{} Fetched {} blocks", green("✔"), bold(&block_count.to_string()));
    }

    fn on_job_error(&self, _job_id: &str, error: &str) {
        self.bar.finish_and_clear();
        let first_line = error.lines().next().unwrap_or(error);
        eprintln!("{} {}", red("✘"), red(first_line));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyse a PDF, upload to s3://my-docs/report.pdf
  pdf-analyze report.pdf my-docs

  # Namespace the upload under a prefix (s3://my-docs/incoming/report.pdf)
  pdf-analyze report.pdf my-docs incoming/

  # Write the result to a file, tables sorted by row/column
  pdf-analyze --sort-cells -o report.json report.pdf my-docs

  # Re-run the reconstruction on a saved GetDocumentAnalysis response
  pdf-analyze --from-blocks response.json

  # Poll every 10 s for at most an hour
  pdf-analyze --poll-interval 10 --max-polls 360 big.pdf my-docs

ENVIRONMENT VARIABLES:
  AWS_PROFILE             Named profile for credentials and region
  AWS_REGION              Region for S3 and Textract
  AWS_ACCESS_KEY_ID       Static credentials (with AWS_SECRET_ACCESS_KEY)
  PDF_ANALYZE_BUCKET      Default bucket
  PDF_ANALYZE_PREFIX      Default key prefix
  PDF_ANALYZE_ENDPOINT    Endpoint override (LocalStack, MinIO + mock Textract)
  RUST_LOG                Log filter, e.g. edgequake_textract=debug

The bucket must be in the same region as the Textract endpoint.
"#;

/// Analyse a PDF with AWS Textract and print raw text, key/value pairs and tables as JSON.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-analyze",
    version,
    about = "Analyse a PDF with AWS Textract: raw text, key/value pairs and tables as JSON",
    long_about = "Upload a document to S3, run an asynchronous Textract analysis with the FORMS \
and TABLES features, wait for it to finish, and rebuild Textract's flat block graph into raw \
text items, key/value pairs and tables of cells.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local document path or HTTP/HTTPS URL (a saved JSON response with --from-blocks).
    input: String,

    /// S3 bucket to upload to.
    #[arg(env = "PDF_ANALYZE_BUCKET", required_unless_present = "from_blocks")]
    bucket: Option<String>,

    /// Key prefix for the uploaded object, e.g. "incoming/".
    #[arg(env = "PDF_ANALYZE_PREFIX")]
    prefix: Option<String>,

    /// AWS region (defaults to the profile/environment region).
    #[arg(long, env = "AWS_REGION")]
    region: Option<String>,

    /// AWS named profile.
    #[arg(long, env = "AWS_PROFILE")]
    profile: Option<String>,

    /// Endpoint override for S3 and Textract.
    #[arg(long, env = "PDF_ANALYZE_ENDPOINT")]
    endpoint_url: Option<String>,

    /// Textract feature to request; repeat for several. Default: forms and tables.
    #[arg(long = "feature", value_enum)]
    features: Vec<FeatureArg>,

    /// Seconds between job status checks.
    #[arg(long, env = "PDF_ANALYZE_POLL_INTERVAL", default_value_t = 5,
          value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval: u64,

    /// Status checks before giving up on the job.
    #[arg(long, env = "PDF_ANALYZE_MAX_POLLS", default_value_t = 360,
          value_parser = clap::value_parser!(u32).range(1..))]
    max_polls: u32,

    /// Sort each table's cells by row, then column.
    #[arg(long, env = "PDF_ANALYZE_SORT_CELLS")]
    sort_cells: bool,

    /// Treat INPUT as a saved Textract JSON response and skip AWS entirely.
    #[arg(long)]
    from_blocks: bool,

    /// Write the JSON result to this file instead of stdout.
    #[arg(short, long, env = "PDF_ANALYZE_OUTPUT")]
    output: Option<PathBuf>,

    /// Print single-line JSON instead of pretty-printed.
    #[arg(long)]
    compact: bool,

    /// Print run statistics to stderr when done.
    #[arg(long)]
    stats: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "PDF_ANALYZE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF_ANALYZE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF_ANALYZE_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds for URL inputs.
    #[arg(long, env = "PDF_ANALYZE_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

impl Cli {
    fn cell_order(&self) -> CellOrder {
        if self.sort_cells {
            CellOrder::RowMajor
        } else {
            CellOrder::Traversal
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FeatureArg {
    Forms,
    Tables,
}

impl From<FeatureArg> for FeatureType {
    fn from(v: FeatureArg) -> Self {
        match v {
            FeatureArg::Forms => FeatureType::Forms,
            FeatureArg::Tables => FeatureType::Tables,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner already reports every stage; keep INFO logs out of its way.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.from_blocks;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Offline mode ─────────────────────────────────────────────────────
    if cli.from_blocks {
        let result = reconstruct_file(&cli.input, cli.cell_order())
            .await
            .context("Failed to reconstruct saved blocks")?;
        return emit(&cli, &result).await;
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn AnalysisProgressCallback>)
    } else {
        None
    };

    let cancel = CancellationToken::new();
    let config = build_config(&cli, progress_cb, cancel.clone())?;

    // Ctrl-C stops polling; the Textract job itself carries on server-side.
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    // ── Run analysis ─────────────────────────────────────────────────────
    let output = analyze(&cli.input, &config)
        .await
        .context("Analysis failed")?;

    emit(&cli, &output.result).await?;

    if cli.stats && !cli.quiet {
        print_stats(&output.stats, &output.bucket, &output.key, &output.job_id);
    }

    Ok(())
}

/// Map CLI args to `AnalysisConfig`.
fn build_config(
    cli: &Cli,
    progress: Option<ProgressCallback>,
    cancel: CancellationToken,
) -> Result<AnalysisConfig> {
    let features: Vec<FeatureType> = if cli.features.is_empty() {
        FeatureType::defaults()
    } else {
        let mut features: Vec<FeatureType> = Vec::new();
        for f in cli.features.iter().copied().map(FeatureType::from) {
            if !features.contains(&f) {
                features.push(f);
            }
        }
        features
    };

    let mut builder = AnalysisConfig::builder()
        .bucket(cli.bucket.clone().unwrap_or_default())
        .features(features)
        .poll_interval(Duration::from_secs(cli.poll_interval))
        .max_poll_attempts(cli.max_polls)
        .cell_order(cli.cell_order())
        .download_timeout_secs(cli.download_timeout)
        .cancellation_token(cancel);

    if let Some(ref prefix) = cli.prefix {
        builder = builder.key_prefix(prefix);
    }
    if let Some(ref region) = cli.region {
        builder = builder.region(region);
    }
    if let Some(ref profile) = cli.profile {
        builder = builder.profile(profile);
    }
    if let Some(ref endpoint) = cli.endpoint_url {
        builder = builder.endpoint_url(endpoint);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Write the result to `--output` or stdout.
async fn emit(cli: &Cli, result: &AnalysisResult) -> Result<()> {
    if let Some(ref path) = cli.output {
        write_result(result, path, !cli.compact)
            .await
            .context("Failed to write result")?;
        if !cli.quiet {
            eprintln!("{} Result written to {}", green("✔"), bold(&path.display().to_string()));
        }
        return Ok(());
    }

    let json = if cli.compact {
        serde_json::to_string(result)
    } else {
        serde_json::to_string_pretty(result)
    }
    .context("Failed to serialise result")?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(json.as_bytes())
        .and_then(|_| handle.write_all(b"\n"))
        .context("Failed to write to stdout")?;
    Ok(())
}

fn print_stats(stats: &AnalysisStats, bucket: &str, key: &str, job_id: &str) {
    eprintln!("   s3://{bucket}/{key}  job {}", dim(job_id));
    eprintln!(
        "   {} blocks  /  {} status checks",
        bold(&stats.block_count.to_string()),
        stats.poll_attempts
    );
    eprintln!(
        "   upload {}ms  /  analysis {}ms  /  {}ms total",
        dim(&stats.upload_duration_ms.to_string()),
        dim(&stats.analysis_duration_ms.to_string()),
        stats.total_duration_ms,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("pdf-analyze").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn positional_args() {
        let cli = parse(&["report.pdf", "my-docs", "incoming/"]);
        assert_eq!(cli.input, "report.pdf");
        assert_eq!(cli.bucket.as_deref(), Some("my-docs"));
        assert_eq!(cli.prefix.as_deref(), Some("incoming/"));
        assert_eq!(cli.poll_interval, 5);
    }

    #[test]
    fn from_blocks_needs_no_bucket() {
        let cli = parse(&["--from-blocks", "response.json"]);
        assert!(cli.from_blocks);
        assert_eq!(cli.input, "response.json");
    }

    #[test]
    fn duplicate_features_collapse() {
        let cli = parse(&["a.pdf", "docs", "--feature", "tables", "--feature", "tables"]);
        let config = build_config(&cli, None, CancellationToken::new()).unwrap();
        assert_eq!(config.features, vec![FeatureType::Tables]);
    }

    #[test]
    fn sort_cells_selects_row_major() {
        assert_eq!(parse(&["a.pdf", "docs"]).cell_order(), CellOrder::Traversal);
        assert_eq!(
            parse(&["a.pdf", "docs", "--sort-cells"]).cell_order(),
            CellOrder::RowMajor
        );
    }

    #[test]
    fn zero_poll_interval_rejected() {
        let args = ["pdf-analyze", "a.pdf", "docs", "--poll-interval", "0"];
        assert!(Cli::try_parse_from(args).is_err());
    }
}
