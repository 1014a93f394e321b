#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

//! # Garment Cutout Library
//!
//! Background removal for garment photos destined for virtual try-on. Produces
//! an RGBA image whose alpha channel separates the garment from its backdrop.
//!
//! Two segmentation paths are available:
//!
//! - **Learned segmenter**: an optional, injected [`LearnedSegmenter`], for example
//!   a locally installed `rembg` driven through [`CommandSegmenter`]
//! - **Heuristic matte**: colour distance to the corner-estimated background,
//!   with adaptive threshold retry, morphological closing and a soft edge blur
//!
//! The learned path is tried first when installed and enabled; any failure
//! falls back to the heuristic matte, so a decodable image always yields a
//! result.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use garment_cutout::{remove_background_from_bytes, RemovalConfig};
//!
//! # fn example() -> anyhow::Result<()> {
//! let bytes = std::fs::read("shirt.jpg")?;
//! let config = RemovalConfig::builder()
//!     .threshold(45)
//!     .smoothing_radius(3)
//!     .build()?;
//! let result = remove_background_from_bytes(&bytes, &config)?;
//! result.save_png("shirt_cutout.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom segmenter and reporter
//!
//! ```rust,no_run
//! use garment_cutout::{
//!     BackgroundRemovalProcessor, CommandSegmenter, ConsoleProgressReporter, RemovalConfig,
//! };
//!
//! # fn example(bytes: &[u8]) -> anyhow::Result<()> {
//! let processor = BackgroundRemovalProcessor::with_components(
//!     RemovalConfig::default(),
//!     Box::new(CommandSegmenter::rembg()),
//!     Box::new(ConsoleProgressReporter::new(true)),
//! )?;
//! let result = processor.process_bytes(bytes)?;
//! println!("{}", result.metadata.method);
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): command-line interface and subscriber setup
//! - `webp-support` (default): WebP decoding and encoding
//! - `tracing-json`: JSON log output for the CLI

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod heuristic;
pub mod inference;
pub mod processor;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;

// Internal imports for lib functions
use tokio::io::AsyncRead;

// Public API exports
pub use backends::{create_segmenter, CommandSegmenter};
pub use config::{OutputFormat, RemovalConfig, RemovalConfigBuilder, SegmentationParams};
pub use error::{CutoutError, Result};
pub use heuristic::{
    build_foreground_mask, estimate_background_color, refine_mask, HeuristicSegmenter,
    MaskRefiner,
};
pub use inference::{LearnedSegmenter, NoOpSegmenter};
pub use processor::{BackgroundRemovalProcessor, SegmentationOutcome};
pub use services::{
    ConsoleProgressReporter, ImageIOService, InputLoader, InputSource, NoOpProgressReporter,
    OutputFormatHandler, ProcessingStage, ProgressReporter, ProgressTracker, ProgressUpdate,
    TracingProgressReporter,
};
pub use types::{
    AlphaMask, BackgroundColor, GarmentResponse, HeuristicReport, ProcessingMetadata,
    ProcessingTimings, RemovalResult, SegmentationMethod,
};
pub use utils::ImageNormalizer;

#[cfg(feature = "cli")]
pub use tracing_config::{TracingConfig, TracingFormat};

fn default_processor(config: &RemovalConfig) -> Result<BackgroundRemovalProcessor> {
    let segmenter: Box<dyn LearnedSegmenter> = if config.use_learned_segmenter {
        create_segmenter(None)
    } else {
        Box::new(NoOpSegmenter)
    };

    BackgroundRemovalProcessor::with_components(
        config.clone(),
        segmenter,
        Box::new(TracingProgressReporter),
    )
}

/// Remove the background from encoded image bytes
///
/// When `config.use_learned_segmenter` is set, a `rembg` found on `PATH` is
/// used as the learned segmenter; otherwise only the heuristic matte runs.
///
/// # Examples
///
/// ```rust,no_run
/// use garment_cutout::{remove_background_from_bytes, GarmentResponse, RemovalConfig};
///
/// # fn example(upload_bytes: Vec<u8>) -> anyhow::Result<()> {
/// let result = remove_background_from_bytes(&upload_bytes, &RemovalConfig::default())?;
/// let response = GarmentResponse::from_result(&result, "upper", "male")?;
/// println!("{}", serde_json::to_string(&response)?);
/// # Ok(())
/// # }
/// ```
pub fn remove_background_from_bytes(
    image_bytes: &[u8],
    config: &RemovalConfig,
) -> Result<RemovalResult> {
    default_processor(config)?.process_bytes(image_bytes)
}

/// Remove the background from an already decoded image
///
/// # Examples
///
/// ```rust
/// use garment_cutout::{remove_background_from_image, RemovalConfig};
/// use image::{DynamicImage, Rgb, RgbImage};
///
/// let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([200, 200, 200])));
/// let config = RemovalConfig::builder().use_learned_segmenter(false).build().unwrap();
/// let result = remove_background_from_image(&image, &config).unwrap();
/// assert_eq!(result.dimensions(), (8, 8));
/// ```
pub fn remove_background_from_image(
    image: &image::DynamicImage,
    config: &RemovalConfig,
) -> Result<RemovalResult> {
    default_processor(config)?.process_image(image)
}

/// Remove the background from an async reader stream
///
/// The stream is read to end, up to the configured upload limit.
///
/// # Examples
///
/// ```rust,no_run
/// use garment_cutout::{remove_background_from_reader, RemovalConfig};
/// use tokio::fs::File;
///
/// # async fn example() -> anyhow::Result<()> {
/// let file = File::open("shirt.jpg").await?;
/// let result = remove_background_from_reader(file, &RemovalConfig::default()).await?;
/// result.save_png("shirt_cutout.png")?;
/// # Ok(())
/// # }
/// ```
pub async fn remove_background_from_reader<R: AsyncRead + Unpin>(
    reader: R,
    config: &RemovalConfig,
) -> Result<RemovalResult> {
    default_processor(config)?.process_reader(reader).await
}
