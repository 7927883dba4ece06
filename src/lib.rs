//! # edgequake-img2pdf
//!
//! Bind a folder of raster images (PNG, JPEG, WebP) into one paginated PDF,
//! one image per page, each scaled to fit the page with its aspect ratio
//! preserved and centred.
//!
//! ## Pipeline Overview
//!
//! ```text
//! directory
//!  │
//!  ├─ 1. Input      list *.png / *.jpg / *.jpeg / *.webp
//!  ├─ 2. Sequence   natural sort (img2 < img10), zero-based indices
//!  ├─ 3. Dispatch   chunks of N images on blocking workers, unordered
//!  │                 └─ Transform: fit to page, passthrough or JPEG re-encode
//!  ├─ 4. Aggregate  restore index order, split successes / failures
//!  └─ 5. Compose    sequential lopdf pages, centred, serialised to bytes
//! ```
//!
//! A bad image never aborts the run: it is reported in
//! [`ConversionOutput::failures`] and simply contributes no page.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_img2pdf::{convert_to_file, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let stats = convert_to_file("input_images", "output/output.pdf", &config).await?;
//!     eprintln!("{} pages, {} failed", stats.pages, stats.failed);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `img2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-img2pdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConversionConfig, ConversionConfigBuilder, PageGeometry, PageSize, DEFAULT_DPI,
    DEFAULT_RESIZE_TOLERANCE,
};
pub use convert::{convert, convert_files, convert_sync, convert_to_file, plan, save_document};
pub use error::{Img2PdfError, ItemError};
pub use output::{
    ConversionOutput, ConversionPlan, ConversionStats, FailedImage, ImageTask, SourceFormat,
    TransformedImage,
};
pub use pipeline::input::SUPPORTED_EXTENSIONS;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
