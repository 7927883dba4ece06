//! Conversion entry points.
//!
//! Every entry point runs the same pipeline: discover → sequence → dispatch
//! → aggregate → compose. The whole document is held in memory and returned
//! (or persisted) only once every image has been accounted for.

use crate::config::ConversionConfig;
use crate::error::Img2PdfError;
use crate::output::{ConversionOutput, ConversionPlan, ConversionStats};
use crate::pipeline::aggregate::Aggregator;
use crate::pipeline::compose::compose;
use crate::pipeline::dispatch::{self, chunk_count, worker_count};
use crate::pipeline::transform::Transformer;
use crate::pipeline::{input, sequence};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert every supported image in `input_dir` into one PDF.
///
/// # Returns
/// `Ok(ConversionOutput)` on success, even if some images failed
/// (check `output.failures` or call [`ConversionOutput::into_result`]).
///
/// # Errors
/// Returns `Err(Img2PdfError)` only for fatal errors:
/// - Directory missing, unreadable, or not a directory
/// - No supported images found
/// - Every image failed, so there is no page to write
pub async fn convert(
    input_dir: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Img2PdfError> {
    let dir = input_dir.as_ref();
    info!("Starting conversion: {}", dir.display());
    let paths = input::discover_images(dir)?;
    run(paths, config).await
}

/// Convert an explicit list of image files, ordered naturally by file name.
///
/// Paths are not filtered by extension; a file that is not a supported image
/// becomes a per-image failure.
pub async fn convert_files<I, P>(
    paths: I,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Img2PdfError>
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    let paths: Vec<PathBuf> = paths.into_iter().map(Into::into).collect();
    if paths.is_empty() {
        return Err(Img2PdfError::NoImages {
            location: "the supplied file list".into(),
        });
    }
    run(paths, config).await
}

/// Convert `input_dir` and write the PDF to `output_path`.
///
/// The destination directory is created before any image is processed. The
/// file is written to a temporary sibling and renamed into place, so an
/// interrupted run never leaves a truncated PDF behind.
pub async fn convert_to_file(
    input_dir: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionStats, Img2PdfError> {
    let path = output_path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Img2PdfError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let output = convert(input_dir, config).await?;
    save_document(path, output.document).await?;
    Ok(output.stats)
}

/// Persist finished PDF bytes at `output_path`, atomically.
///
/// Creates missing parent directories. The bytes go to a temporary sibling
/// file which is renamed over `output_path` once fully written.
pub async fn save_document(
    output_path: impl AsRef<Path>,
    document: Vec<u8>,
) -> Result<(), Img2PdfError> {
    let path = output_path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Img2PdfError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }
    write_atomic(path, document).await?;
    info!("PDF saved to: {}", path.display());
    Ok(())
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_dir: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Img2PdfError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Img2PdfError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_dir, config))
}

/// Work out what [`convert`] would do without decoding any image.
pub fn plan(
    input_dir: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionPlan, Img2PdfError> {
    let paths = input::discover_images(input_dir.as_ref())?;
    let tasks = sequence::sequence(paths);
    let chunks = chunk_count(tasks.len(), config.chunk_size);
    Ok(ConversionPlan {
        workers: worker_count(config.max_workers, chunks),
        chunks,
        chunk_size: config.chunk_size,
        page: config.page_geometry(),
        tasks,
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn run(
    paths: Vec<PathBuf>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Img2PdfError> {
    let total_start = Instant::now();

    let tasks = sequence::sequence(paths);
    let total = tasks.len();
    let mut aggregator = Aggregator::new(&tasks);

    // ── Transform (parallel, unordered) ──────────────────────────────────
    let transform_start = Instant::now();
    let mut running = dispatch::dispatch(
        tasks,
        Transformer::from_config(config),
        config.chunk_size,
        config.max_workers,
    );
    let (workers, chunks) = (running.workers, running.chunks);
    info!(
        "Processing {} images in {} chunks with {} workers",
        total, chunks, workers
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(total, workers);
    }

    while let Some(report) = running.reports.recv().await {
        for failed in aggregator.push(report) {
            warn!("Image {} failed: {}", failed.index, failed.error);
            if let Some(ref cb) = config.progress_callback {
                cb.on_image_error(failed.index, &failed.path, &failed.error.to_string());
            }
        }
        if let Some(ref cb) = config.progress_callback {
            cb.on_chunk_complete(aggregator.reported(), total);
        }
    }
    running.join().await;
    let transform_duration_ms = transform_start.elapsed().as_millis() as u64;

    // ── Restore order ────────────────────────────────────────────────────
    let aggregated = aggregator.finish();
    debug!(
        "Transformed in {}ms: {} converted, {} passed through, {} failed",
        transform_duration_ms,
        aggregated.converted,
        aggregated.passed_through,
        aggregated.failures.len()
    );
    if aggregated.successes.is_empty() {
        return Err(all_failed(total, &aggregated.failures));
    }

    // ── Compose (sequential) ─────────────────────────────────────────────
    if let Some(ref cb) = config.progress_callback {
        cb.on_compose_start(aggregated.successes.len());
    }
    let compose_start = Instant::now();
    let page = config.page_geometry();
    let title = config.title.clone();
    let successes = aggregated.successes;
    let composed = tokio::task::spawn_blocking(move || compose(successes, page, title.as_deref()))
        .await
        .map_err(|e| Img2PdfError::Internal(format!("Compose task failed: {}", e)))??;
    let compose_duration_ms = compose_start.elapsed().as_millis() as u64;

    if let Some(ref cb) = config.progress_callback {
        for failed in &composed.placement_failures {
            cb.on_image_error(failed.index, &failed.path, &failed.error.to_string());
        }
    }

    let placement_failed = composed.placement_failures.len();
    let mut failures = aggregated.failures;
    let failed = failures.len();
    failures.extend(composed.placement_failures);
    failures.sort_by_key(|f| f.index);

    if composed.pages == 0 {
        return Err(all_failed(total, &failures));
    }

    let stats = ConversionStats {
        total_images: total,
        converted: aggregated.converted,
        passed_through: aggregated.passed_through,
        failed,
        placement_failed,
        pages: composed.pages,
        workers,
        chunks,
        transform_duration_ms,
        compose_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Conversion complete: {}/{} pages, {} converted, {} passed through, {}ms total",
        stats.pages, total, stats.converted, stats.passed_through, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(&stats);
    }

    Ok(ConversionOutput {
        document: composed.document,
        failures,
        stats,
    })
}

fn all_failed(total: usize, failures: &[crate::output::FailedImage]) -> Img2PdfError {
    let first_error = failures
        .first()
        .map(|f| f.error.to_string())
        .unwrap_or_else(|| "Unknown error".to_string());
    Img2PdfError::AllImagesFailed { total, first_error }
}

/// Write `bytes` to a temp file beside `path`, then rename over `path`.
async fn write_atomic(path: &Path, bytes: Vec<u8>) -> Result<(), Img2PdfError> {
    let target = path.to_path_buf();
    let result = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let parent = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| Img2PdfError::Internal(format!("Write task failed: {}", e)))?;

    result.map_err(|source| Img2PdfError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    })
}
