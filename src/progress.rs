//! Progress-callback trait for conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as chunks of images finish and the document is composed.
//!
//! Callers can forward events to a terminal progress bar, a channel or a log
//! without the library knowing how the host application communicates.
//!
//! # Example
//!
//! ```rust
//! use edgequake_img2pdf::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_chunk_complete(&self, done: usize, total: usize) {
//!         self.done.store(done, Ordering::SeqCst);
//!         eprintln!("{done}/{total} images transformed");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { done: AtomicUsize::new(0) });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::ConversionStats;
use std::path::Path;
use std::sync::Arc;

/// Called by the conversion pipeline as it processes images.
///
/// Implementations must be `Send + Sync`. All methods have default no-op
/// implementations so callers only override what they care about.
///
/// # Thread safety
///
/// Events are delivered from the task that drains the result channel, so
/// calls never overlap within one run. Separate runs sharing one callback may
/// still call it concurrently.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before any image is transformed.
    ///
    /// # Arguments
    /// * `total_images` — number of images discovered
    /// * `workers`      — effective number of parallel workers
    fn on_conversion_start(&self, total_images: usize, workers: usize) {
        let _ = (total_images, workers);
    }

    /// Called once per finished chunk, in completion order.
    ///
    /// # Arguments
    /// * `done`  — images reported so far (successes and failures)
    /// * `total` — total images in the run
    fn on_chunk_complete(&self, done: usize, total: usize) {
        let _ = (done, total);
    }

    /// Called for each image that failed to transform or be placed.
    ///
    /// # Arguments
    /// * `index` — zero-based position in the natural-sort order
    /// * `path`  — source path of the image
    /// * `error` — human-readable error description
    fn on_image_error(&self, index: usize, path: &Path, error: &str) {
        let _ = (index, path, error);
    }

    /// Called before sequential composition starts.
    fn on_compose_start(&self, pages: usize) {
        let _ = pages;
    }

    /// Called once after the document has been serialised.
    fn on_conversion_complete(&self, stats: &ConversionStats) {
        let _ = stats;
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
