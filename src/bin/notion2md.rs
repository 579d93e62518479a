//! CLI binary for notion2md.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExportConfig` and prints a one-line status.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use notion2md::{
    export_page, output_path_for, write_output, ExportConfig, ExportProgressCallback,
    ExportStats, ProgressCallback, StoreConfig,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a block counter bar plus one log line per
/// image, printed above the bar.
struct CliProgressCallback {
    bar: ProgressBar,
    fallbacks: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_export_start` tells us how many blocks there are.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Fetching");
        bar.set_message("Reading page…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            fallbacks: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>4}/{len} blocks  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
    }
}

impl ExportProgressCallback for CliProgressCallback {
    fn on_export_start(&self, total_blocks: usize) {
        self.activate_bar(total_blocks);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total_blocks} blocks…"))
        ));
    }

    fn on_block_converted(&self, index: usize, _total_blocks: usize) {
        self.bar.set_position(index as u64);
    }

    fn on_image_relocated(&self, _source_url: &str, public_url: &str) {
        self.bar
            .println(format!("  {} {}", green("✓"), dim(public_url)));
    }

    fn on_image_fallback(&self, source_url: &str, error: &str) {
        self.fallbacks.fetch_add(1, Ordering::SeqCst);

        // Notion file URLs carry long signed query strings.
        let shown = source_url.split('?').next().unwrap_or(source_url);
        let msg = if error.len() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {}  {}",
            yellow("⚠"),
            dim(shown),
            yellow(&msg)
        ));
    }

    fn on_export_complete(&self, stats: &ExportStats) {
        self.bar.finish_and_clear();
        let fallbacks = self.fallbacks.load(Ordering::SeqCst);
        eprintln!(
            "{} {}/{} blocks  {} images uploaded  {} reused  {}  {}ms",
            if fallbacks == 0 { green("✔") } else { yellow("⚠") },
            bold(&stats.emitted_blocks.to_string()),
            stats.total_blocks,
            stats.images_relocated,
            stats.images_reused,
            if fallbacks == 0 {
                dim("0 kept at source")
            } else {
                yellow(&format!("{fallbacks} kept at source"))
            },
            stats.duration_ms,
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Export the page named by NOTION_PAGE_ID into ./doc
  notion2md

  # Export a specific page (id, dashed UUID or page URL)
  notion2md 0123456789abcdef0123456789abcdef

  # Print Markdown instead of writing a file
  notion2md --stdout https://www.notion.so/My-Page-0123456789abcdef0123456789abcdef

  # Keep images at their Notion URLs (no R2_* variables set)
  NOTION_TOKEN=secret_... notion2md --output-dir notes PAGE_ID

ENVIRONMENT VARIABLES:
  NOTION_TOKEN            Notion integration token (required)
  NOTION_PAGE_ID          Page exported when no argument is given
  R2_ENDPOINT             S3-compatible endpoint; unset disables image relocation
  R2_BUCKET               Bucket images are uploaded to
  R2_ACCESS_KEY           Access key id
  R2_SECRET_KEY           Secret access key
  R2_REGION               Signing region (default: auto)
  R2_PUBLIC_DOMAIN        Public base URL for uploaded images
  IMAGE_PREFIX            Object key prefix (default: images)
  VERBOSE_OUTPUT          Enable debug logs
"#;

/// Export a Notion page to Markdown, moving its images to object storage.
#[derive(Parser, Debug)]
#[command(
    name = "notion2md",
    version,
    about = "Export a Notion page to Markdown, moving its images to S3-compatible storage",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Page id, dashed UUID or page URL.
    page: Option<String>,

    /// Page to export when no positional argument is given.
    #[arg(long = "page-id", env = "NOTION_PAGE_ID")]
    page_id: Option<String>,

    /// Notion integration token.
    #[arg(long, env = "NOTION_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Directory the Markdown file is written to.
    #[arg(long, env = "NOTION2MD_OUTPUT_DIR", default_value = "doc")]
    output_dir: PathBuf,

    /// S3-compatible endpoint URL. Unset keeps images at their source URLs.
    #[arg(long, env = "R2_ENDPOINT")]
    r2_endpoint: Option<String>,

    /// Bucket images are uploaded to.
    #[arg(long, env = "R2_BUCKET", default_value = "")]
    r2_bucket: String,

    /// Object store access key id.
    #[arg(long, env = "R2_ACCESS_KEY", default_value = "", hide_env_values = true)]
    r2_access_key: String,

    /// Object store secret access key.
    #[arg(long, env = "R2_SECRET_KEY", default_value = "", hide_env_values = true)]
    r2_secret_key: String,

    /// Signing region.
    #[arg(long, env = "R2_REGION", default_value = "auto")]
    r2_region: String,

    /// Key prefix for uploaded images.
    #[arg(long, env = "IMAGE_PREFIX", default_value = "images")]
    image_prefix: String,

    /// Public base URL for uploaded images (default: {endpoint}/{bucket}).
    #[arg(long, env = "R2_PUBLIC_DOMAIN")]
    public_domain: Option<String>,

    /// Image relocations in flight at once.
    #[arg(long, env = "NOTION2MD_IMAGE_CONCURRENCY", default_value_t = 4)]
    image_concurrency: usize,

    /// Image download timeout in seconds.
    #[arg(long, env = "NOTION2MD_DOWNLOAD_TIMEOUT", default_value_t = 10)]
    download_timeout: u64,

    /// Image upload timeout in seconds.
    #[arg(long, env = "NOTION2MD_UPLOAD_TIMEOUT", default_value_t = 60)]
    upload_timeout: u64,

    /// Notion API request timeout in seconds.
    #[arg(long, env = "NOTION2MD_API_TIMEOUT", default_value_t = 30)]
    api_timeout: u64,

    /// Upload repeated image URLs again instead of reusing the first upload.
    #[arg(long, env = "NOTION2MD_NO_DEDUPE")]
    no_dedupe: bool,

    /// Fail when the page title and properties cannot be fetched.
    #[arg(long, env = "NOTION2MD_REQUIRE_METADATA")]
    require_metadata: bool,

    /// Print Markdown to stdout instead of writing a file.
    #[arg(long)]
    stdout: bool,

    /// Print the export result (`ExportOutput`) as JSON instead of writing a file.
    #[arg(long, conflicts_with = "stdout")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "NOTION2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "VERBOSE_OUTPUT")]
    verbose: bool,

    /// Suppress all output except errors and the status line.
    #[arg(short, long, env = "NOTION2MD_QUIET")]
    quiet: bool,
}

impl Cli {
    /// Writing the document to stdout leaves no room for status output there.
    fn stdout_reserved(&self) -> bool {
        self.stdout || self.json
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar already reports what matters; keep library logs to
    // errors while it is shown.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.stdout_reserved();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let reserved = cli.stdout_reserved();
    match run(cli, show_progress).await {
        Ok(target) => {
            let line = format!("✅ Export complete: {target}");
            if reserved {
                eprintln!("{line}");
            } else {
                println!("{line}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            let line = format!("❌ Export failed: {e:#}");
            if reserved {
                eprintln!("{line}");
            } else {
                println!("{line}");
            }
            ExitCode::FAILURE
        }
    }
}

/// Run one export; returns what the status line should point at.
async fn run(cli: Cli, show_progress: bool) -> Result<String> {
    let page_id = cli
        .page
        .clone()
        .or_else(|| cli.page_id.clone())
        .filter(|id| !id.trim().is_empty())
        .context("No page given: pass a page id or set NOTION_PAGE_ID")?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ExportProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    let output = export_page(&page_id, &config).await?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
        return Ok("stdout (json)".to_string());
    }

    if cli.stdout {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(output.markdown.as_bytes())
            .context("Failed to write to stdout")?;
        if !output.markdown.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
        return Ok("stdout".to_string());
    }

    let path = output_path_for(&config.output_dir, &output.title, &output.page_id);
    write_output(&path, &output.markdown).await?;

    if !cli.quiet && !show_progress {
        eprintln!(
            "Exported {}/{} blocks in {}ms ({} images uploaded, {} reused, {} kept at source)",
            output.stats.emitted_blocks,
            output.stats.total_blocks,
            output.stats.duration_ms,
            output.stats.images_relocated,
            output.stats.images_reused,
            output.stats.images_fallback,
        );
    }

    Ok(path.display().to_string())
}

/// Map CLI args to `ExportConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExportConfig> {
    let mut builder = ExportConfig::builder()
        .output_dir(cli.output_dir.clone())
        .image_concurrency(cli.image_concurrency)
        .download_timeout_secs(cli.download_timeout)
        .upload_timeout_secs(cli.upload_timeout)
        .api_timeout_secs(cli.api_timeout)
        .dedupe_images(!cli.no_dedupe)
        .require_metadata(cli.require_metadata);

    if let Some(ref token) = cli.token {
        builder = builder.token(token.clone());
    }

    if let Some(store) = store_config(cli) {
        builder = builder.store(store);
    }

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Object store settings, present only when an endpoint is configured.
fn store_config(cli: &Cli) -> Option<StoreConfig> {
    let endpoint = cli.r2_endpoint.as_deref().map(str::trim)?;
    if endpoint.is_empty() {
        return None;
    }

    let mut store = StoreConfig::new(endpoint, cli.r2_bucket.trim())
        .credentials(cli.r2_access_key.clone(), cli.r2_secret_key.clone())
        .region(cli.r2_region.clone())
        .key_prefix(cli.image_prefix.clone());
    if let Some(ref domain) = cli.public_domain {
        store = store.custom_domain(domain.clone());
    }
    Some(store)
}
