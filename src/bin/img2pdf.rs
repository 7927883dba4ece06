//! CLI binary for edgequake-img2pdf.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_img2pdf::{
    convert, plan, save_document, ConversionConfig, ConversionProgressCallback, ConversionStats,
    FailedImage, PageSize, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar advanced per finished chunk, with a
/// log line for every image that fails.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_conversion_start

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Scanning images…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>4}/{len} images  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Transforming");
        self.bar.reset_eta();
    }

    /// Clear the bar and stop its ticker after a fatal error.
    fn abandon(&self) {
        self.bar.finish_and_clear();
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_images: usize, workers: usize) {
        self.activate_bar(total_images);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "Binding {total_images} images with {workers} worker{}…",
                if workers == 1 { "" } else { "s" }
            ))
        ));
    }

    fn on_chunk_complete(&self, done: usize, _total: usize) {
        self.bar.set_position(done as u64);
    }

    fn on_image_error(&self, index: usize, path: &Path, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        // Truncate very long error messages to keep output tidy.
        let msg: String = if error.chars().count() > 80 {
            let mut s: String = error.chars().take(79).collect();
            s.push('…');
            s
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} #{:<4} {}  {}",
            red("✗"),
            index + 1,
            name,
            red(&msg),
        ));
    }

    fn on_compose_start(&self, pages: usize) {
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        self.bar.set_style(spinner_style);
        self.bar.set_prefix("Composing");
        self.bar.set_message(format!("{pages} pages"));
    }

    fn on_conversion_complete(&self, stats: &ConversionStats) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);

        if failed == 0 {
            eprintln!(
                "{} {} pages  {}",
                green("✔"),
                bold(&stats.pages.to_string()),
                dim(&format!(
                    "({} converted, {} passed through)",
                    stats.converted, stats.passed_through
                )),
            );
        } else {
            eprintln!(
                "{} {}/{} pages  ({} failed)",
                cyan("⚠"),
                bold(&stats.pages.to_string()),
                stats.total_images,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Bind ./input_images into ./output/output.pdf
  img2pdf

  # Explicit folders and file name
  img2pdf scans/ --output-dir books --name chapter-01

  # US Letter pages at 150 DPI, higher JPEG quality
  img2pdf scans/ --page-size letter --dpi 150 --quality 92

  # Show the page order and worker plan without converting
  img2pdf scans/ --dry-run

  # Machine-readable report
  img2pdf scans/ --json > report.json

ORDERING:
  Files are ordered by natural sort on the file name: digit runs compare
  numerically and letters compare case-insensitively, so page2.png comes
  before page10.png.

SUPPORTED FORMATS:
  png, jpg, jpeg, webp (extension match is case-insensitive).
  JPEGs that already fit the page within --tolerance are embedded untouched;
  everything else is resized with Lanczos3 and re-encoded as JPEG.

ENVIRONMENT VARIABLES:
  INPUT_DIRECTORY    Input folder            (default: input_images)
  OUTPUT_DIRECTORY   Output folder           (default: output)
  OUTPUT_PDF         Output file name, no .pdf suffix (default: output)
  MAX_WORKERS        Upper bound on parallel workers  (default: 10)
  RUST_LOG           Override log filter, e.g. RUST_LOG=edgequake_img2pdf=debug
"#;

/// Bind a folder of images into a single PDF, one centred image per page.
#[derive(Parser, Debug)]
#[command(
    name = "img2pdf",
    version,
    about = "Bind a folder of images into a single PDF, one centred image per page",
    long_about = "Bind every PNG, JPEG and WebP image in a folder into one PDF. Images are \
ordered by natural sort, scaled to fit the page without distortion, centred, and processed \
in parallel chunks. A broken image is reported and skipped; it never aborts the run.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Folder containing the images.
    #[arg(env = "INPUT_DIRECTORY", default_value = "input_images")]
    input: PathBuf,

    /// Folder the PDF is written to (created if missing).
    #[arg(short = 'd', long, env = "OUTPUT_DIRECTORY", default_value = "output")]
    output_dir: PathBuf,

    /// Output file name; `.pdf` is appended when missing.
    #[arg(short, long, env = "OUTPUT_PDF", default_value = "output")]
    name: String,

    /// Upper bound on parallel workers (also capped by CPU count).
    #[arg(short = 'w', long, env = "MAX_WORKERS", default_value_t = 10,
          value_parser = clap::value_parser!(u64).range(1..))]
    max_workers: u64,

    /// Images per worker chunk.
    #[arg(long, env = "IMG2PDF_CHUNK_SIZE", default_value_t = 5,
          value_parser = clap::value_parser!(u64).range(1..))]
    chunk_size: u64,

    /// Target DPI; also the fallback for images without density metadata.
    #[arg(long, env = "IMG2PDF_DPI", default_value_t = 300.0)]
    dpi: f64,

    /// JPEG quality for re-encoded images (1–100).
    #[arg(long, env = "IMG2PDF_QUALITY", default_value_t = 80,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Page size: a3, a4, a5, letter, legal, or WxH in points (e.g. 500x700).
    #[arg(long, env = "IMG2PDF_PAGE_SIZE", default_value = "a4", value_name = "SIZE")]
    page_size: PageSize,

    /// Relative size difference tolerated before an image is resized.
    #[arg(long, env = "IMG2PDF_TOLERANCE", default_value_t = 0.01)]
    tolerance: f64,

    /// Document title written to the PDF metadata.
    #[arg(long, env = "IMG2PDF_TITLE")]
    title: Option<String>,

    /// Print the page order and worker plan, then exit without converting.
    #[arg(long)]
    dry_run: bool,

    /// Print a JSON report (stats and failures) on stdout.
    #[arg(long, env = "IMG2PDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "IMG2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "IMG2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "IMG2PDF_QUIET")]
    quiet: bool,
}

/// `--json` payload.
#[derive(Serialize)]
struct JsonReport<'a> {
    output: &'a Path,
    stats: &'a ConversionStats,
    failures: &'a [FailedImage],
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.dry_run;
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

    let cli_progress = show_progress.then(CliProgressCallback::new_dynamic);
    let progress_cb: Option<ProgressCallback> = cli_progress
        .clone()
        .map(|cb| cb as Arc<dyn ConversionProgressCallback>);

    let result = run(&cli, progress_cb, show_progress).await;
    if result.is_err() {
        // Stop the steady tick so it does not draw over the error report.
        if let Some(cb) = cli_progress {
            cb.abandon();
        }
    }
    result
}

async fn run(
    cli: &Cli,
    progress_cb: Option<ProgressCallback>,
    show_progress: bool,
) -> Result<()> {
    let config = build_config(cli, progress_cb)?;
    let output_path = output_path(&cli.output_dir, &cli.name);

    // ── Dry run ──────────────────────────────────────────────────────────
    if cli.dry_run {
        let plan = plan(&cli.input, &config).context("Failed to plan conversion")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&plan).context("Failed to serialise plan")?
            );
        } else {
            println!("Input:    {}", cli.input.display());
            println!("Output:   {}", output_path.display());
            println!(
                "Page:     {:.1} × {:.1} pt @ {} dpi",
                plan.page.width_pt, plan.page.height_pt, plan.page.dpi
            );
            println!(
                "Images:   {} in {} chunks of ≤{} ({} workers)",
                plan.tasks.len(),
                plan.chunks,
                plan.chunk_size,
                plan.workers
            );
            for task in &plan.tasks {
                println!("  {:>4}  {}", task.index + 1, task.path.display());
            }
        }
        return Ok(());
    }

    // ── Run conversion ───────────────────────────────────────────────────
    tokio::fs::create_dir_all(&cli.output_dir)
        .await
        .with_context(|| format!("Failed to create output directory {:?}", cli.output_dir))?;

    let output = convert(&cli.input, &config)
        .await
        .context("Conversion failed")?;
    let failures = output.failures;
    let stats = output.stats;
    save_document(&output_path, output.document)
        .await
        .context("Failed to write PDF")?;

    if cli.json {
        let report = JsonReport {
            output: &output_path,
            stats: &stats,
            failures: &failures,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else if !cli.quiet {
        if !show_progress {
            eprintln!(
                "Bound {}/{} images in {}ms ({} converted, {} passed through)",
                stats.pages,
                stats.total_images,
                stats.total_duration_ms,
                stats.converted,
                stats.passed_through
            );
            for f in &failures {
                eprintln!("  failed #{}: {}", f.index + 1, f.error);
            }
        }
        eprintln!(
            "   {}  →  {}",
            dim(&format!("{}ms", stats.total_duration_ms)),
            bold(&output_path.display().to_string()),
        );
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .page_size(cli.page_size)
        .dpi(cli.dpi)
        .jpeg_quality(cli.quality)
        .chunk_size(cli.chunk_size as usize)
        .max_workers(cli.max_workers as usize)
        .resize_tolerance(cli.tolerance);

    if let Some(ref title) = cli.title {
        builder = builder.title(title.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// `<dir>/<name>.pdf`, without doubling an existing `.pdf` suffix.
fn output_path(dir: &Path, name: &str) -> PathBuf {
    if name.to_ascii_lowercase().ends_with(".pdf") {
        dir.join(name)
    } else {
        dir.join(format!("{name}.pdf"))
    }
}
