//! Background removal processor
//!
//! `BackgroundRemovalProcessor` ties the pipeline together: payload checks,
//! normalization, and the choice between the learned segmenter and the
//! heuristic matte. Both the library functions and the CLI go through it.

use crate::{
    config::RemovalConfig,
    error::{CutoutError, Result},
    heuristic::HeuristicSegmenter,
    inference::{LearnedSegmenter, NoOpSegmenter},
    services::{
        ImageIOService, ProcessingStage, ProgressReporter, ProgressTracker,
        TracingProgressReporter,
    },
    types::{HeuristicReport, ProcessingMetadata, RemovalResult, SegmentationMethod},
    utils::{ImageNormalizer, NormalizedImage},
};
use image::{DynamicImage, ImageFormat, RgbaImage};
use instant::Instant;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info, instrument, span, Level};

/// Output of the segmentation step
#[derive(Debug, Clone)]
pub struct SegmentationOutcome {
    /// RGBA raster with the new alpha channel, same size as the input
    pub image: RgbaImage,
    /// Path that produced the alpha channel
    pub method: SegmentationMethod,
    /// Heuristic diagnostics, present when the heuristic ran
    pub heuristic: Option<HeuristicReport>,
    /// Why the learned segmenter was abandoned, when it was attempted and failed
    pub fallback_reason: Option<String>,
    /// Time spent in the learned segmenter (milliseconds)
    pub learned_ms: u64,
    /// Time spent in the heuristic pipeline (milliseconds)
    pub heuristic_ms: u64,
}

/// Main processor for garment cutouts
///
/// The learned segmenter and the progress reporter are chosen at construction
/// and fixed for the processor's lifetime. The processor holds no per-request
/// state and can be shared across threads.
pub struct BackgroundRemovalProcessor {
    config: RemovalConfig,
    normalizer: ImageNormalizer,
    heuristic: HeuristicSegmenter,
    segmenter: Box<dyn LearnedSegmenter>,
    reporter: Box<dyn ProgressReporter>,
}

impl std::fmt::Debug for BackgroundRemovalProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundRemovalProcessor")
            .field("config", &self.config)
            .field("segmenter", &self.segmenter.name())
            .field("learned_available", &self.segmenter.is_available())
            .finish_non_exhaustive()
    }
}

impl BackgroundRemovalProcessor {
    /// Create a processor without a learned segmenter, reporting through `tracing`
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn new(config: RemovalConfig) -> Result<Self> {
        Self::with_components(
            config,
            Box::new(NoOpSegmenter),
            Box::new(TracingProgressReporter),
        )
    }

    /// Create a processor with an explicit learned segmenter and reporter
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn with_components(
        config: RemovalConfig,
        segmenter: Box<dyn LearnedSegmenter>,
        reporter: Box<dyn ProgressReporter>,
    ) -> Result<Self> {
        config.validate()?;
        let normalizer = ImageNormalizer::new(config.max_dimension)?;
        let heuristic = HeuristicSegmenter::new(config.segmentation);

        if segmenter.is_available() {
            info!(segmenter = segmenter.name(), "Learned segmenter installed");
        } else {
            debug!("No learned segmenter installed, heuristic matte only");
        }

        Ok(Self {
            config,
            normalizer,
            heuristic,
            segmenter,
            reporter,
        })
    }

    /// Replace the learned segmenter
    #[must_use]
    pub fn with_segmenter(mut self, segmenter: Box<dyn LearnedSegmenter>) -> Self {
        self.segmenter = segmenter;
        self
    }

    /// Replace the progress reporter
    #[must_use]
    pub fn with_reporter(mut self, reporter: Box<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Get the current configuration
    #[must_use]
    pub fn config(&self) -> &RemovalConfig {
        &self.config
    }

    /// Whether the installed learned segmenter can be invoked
    #[must_use]
    pub fn learned_available(&self) -> bool {
        self.segmenter.is_available()
    }

    /// Name of the installed learned segmenter
    #[must_use]
    pub fn segmenter_name(&self) -> &str {
        self.segmenter.name()
    }

    /// Process encoded image bytes
    ///
    /// # Examples
    /// ```rust,no_run
    /// use garment_cutout::{BackgroundRemovalProcessor, RemovalConfig};
    ///
    /// # fn example(image_data: Vec<u8>) -> anyhow::Result<()> {
    /// let processor = BackgroundRemovalProcessor::new(RemovalConfig::default())?;
    /// let result = processor.process_bytes(&image_data)?;
    /// let png = result.to_png_bytes()?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// - `InvalidInput` for an empty payload
    /// - `PayloadTooLarge` above the configured upload limit
    /// - `Decode` when the bytes are not an image
    #[instrument(skip(self, image_bytes), fields(bytes = image_bytes.len()))]
    pub fn process_bytes(&self, image_bytes: &[u8]) -> Result<RemovalResult> {
        let mut tracker = ProgressTracker::new(self.reporter.as_ref());
        let total_start = Instant::now();

        tracker.report_stage(ProcessingStage::ImageLoading);
        if let Err(e) =
            ImageIOService::check_payload_size(image_bytes.len(), self.config.max_input_bytes)
        {
            tracker.report_error(&e.to_string());
            return Err(e);
        }

        tracker.report_stage(ProcessingStage::Normalization);
        let normalize_start = Instant::now();
        let normalized = match self.normalizer.normalize_bytes(image_bytes) {
            Ok(normalized) => normalized,
            Err(e) => {
                tracker.report_error(&e.to_string());
                return Err(e);
            },
        };
        let normalize_ms = normalize_start.elapsed().as_millis() as u64;

        Ok(self.finish(normalized, normalize_ms, total_start, &mut tracker))
    }

    /// Process an already decoded image
    ///
    /// # Errors
    /// - `Decode` for a zero-area image
    #[instrument(
        skip(self, image),
        fields(dimensions = %format!("{}x{}", image.width(), image.height()))
    )]
    pub fn process_image(&self, image: &DynamicImage) -> Result<RemovalResult> {
        let mut tracker = ProgressTracker::new(self.reporter.as_ref());
        let total_start = Instant::now();

        tracker.report_stage(ProcessingStage::Normalization);
        let normalize_start = Instant::now();
        let normalized = match self.normalizer.normalize_image(image) {
            Ok(normalized) => normalized,
            Err(e) => {
                tracker.report_error(&e.to_string());
                return Err(e);
            },
        };
        let normalize_ms = normalize_start.elapsed().as_millis() as u64;

        Ok(self.finish(normalized, normalize_ms, total_start, &mut tracker))
    }

    /// Read and process an image file
    ///
    /// # Errors
    /// - File missing or unreadable
    /// - Any error of [`process_bytes`](Self::process_bytes)
    pub fn process_file<P: AsRef<Path>>(&self, input_path: P) -> Result<RemovalResult> {
        let bytes = ImageIOService::read_file(input_path, self.config.max_input_bytes)?;
        self.process_bytes(&bytes)
    }

    /// Read an async stream to end and process it
    ///
    /// Reading stops one byte past the upload limit.
    ///
    /// # Errors
    /// - Stream read failures
    /// - Any error of [`process_bytes`](Self::process_bytes)
    pub async fn process_reader<R: tokio::io::AsyncRead + Unpin>(
        &self,
        reader: R,
    ) -> Result<RemovalResult> {
        let bytes = ImageIOService::read_from_reader(reader, self.config.max_input_bytes).await?;
        self.process_bytes(&bytes)
    }

    /// Produce an RGBA raster with a background-removing alpha channel
    ///
    /// The learned segmenter is attempted only when `use_learned` is set and
    /// the installed segmenter is available. Any failure on that path is
    /// reported as a fallback and the heuristic matte is produced instead, so
    /// this never fails and always returns the input's dimensions.
    #[must_use]
    pub fn segment(&self, image: &RgbaImage, use_learned: bool) -> SegmentationOutcome {
        let mut tracker = ProgressTracker::new(self.reporter.as_ref());
        self.segment_tracked(image, use_learned, &mut tracker)
    }

    fn segment_tracked(
        &self,
        image: &RgbaImage,
        use_learned: bool,
        tracker: &mut ProgressTracker<'_>,
    ) -> SegmentationOutcome {
        let mut learned_ms = 0;
        let mut fallback_reason = None;

        if use_learned && self.segmenter.is_available() {
            tracker.report_stage(ProcessingStage::LearnedSegmentation);
            let learned_start = Instant::now();
            let attempt = {
                let _span = span!(
                    Level::DEBUG,
                    "learned_segmentation",
                    segmenter = self.segmenter.name()
                )
                .entered();
                self.try_learned(image)
            };
            learned_ms = learned_start.elapsed().as_millis() as u64;

            match attempt {
                Ok(output) => {
                    debug!(segmenter = self.segmenter.name(), learned_ms, "Learned matte produced");
                    return SegmentationOutcome {
                        image: output,
                        method: SegmentationMethod::Learned(self.segmenter.name().to_string()),
                        heuristic: None,
                        fallback_reason: None,
                        learned_ms,
                        heuristic_ms: 0,
                    };
                },
                Err(e) => {
                    let reason = e.to_string();
                    tracker.report_fallback(self.segmenter.name(), &reason);
                    fallback_reason = Some(reason);
                },
            }
        } else if use_learned {
            debug!("Learned segmenter requested but not available");
        }

        let heuristic_start = Instant::now();
        let (output, report) = {
            let _span = span!(Level::DEBUG, "heuristic_segmentation").entered();
            self.heuristic
                .segment_with_progress(image, |stage| tracker.report_stage(stage))
        };
        let heuristic_ms = heuristic_start.elapsed().as_millis() as u64;

        SegmentationOutcome {
            image: output,
            method: SegmentationMethod::Heuristic,
            heuristic: Some(report),
            fallback_reason,
            learned_ms,
            heuristic_ms,
        }
    }

    /// One learned segmenter round trip: PNG in, RGBA of the same size out
    fn try_learned(&self, image: &RgbaImage) -> Result<RgbaImage> {
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| CutoutError::segmenter(format!("Failed to encode segmenter input: {}", e)))?;

        let output = self.segmenter.segment(&png)?;

        let decoded = image::load_from_memory(&output)
            .map_err(|e| CutoutError::segmenter(format!("Segmenter output is not an image: {}", e)))?
            .to_rgba8();

        if decoded.dimensions() != image.dimensions() {
            return Err(CutoutError::segmenter(format!(
                "Segmenter output is {}x{}, expected {}x{}",
                decoded.width(),
                decoded.height(),
                image.width(),
                image.height()
            )));
        }

        Ok(decoded)
    }

    fn finish(
        &self,
        normalized: NormalizedImage,
        normalize_ms: u64,
        total_start: Instant,
        tracker: &mut ProgressTracker<'_>,
    ) -> RemovalResult {
        let NormalizedImage {
            image,
            original_dimensions,
        } = normalized;

        let (image, mut metadata) = if self.config.remove_background {
            let outcome = self.segment_tracked(&image, self.config.use_learned_segmenter, tracker);
            let mut metadata = ProcessingMetadata::new(outcome.method);
            metadata.heuristic = outcome.heuristic;
            metadata.fallback_reason = outcome.fallback_reason;
            metadata.timings.learned_ms = outcome.learned_ms;
            metadata.timings.heuristic_ms = outcome.heuristic_ms;
            (outcome.image, metadata)
        } else {
            debug!("Background removal disabled, passing image through");
            (image, ProcessingMetadata::new(SegmentationMethod::Passthrough))
        };

        metadata.timings.normalize_ms = normalize_ms;
        metadata.timings.total_ms = total_start.elapsed().as_millis() as u64;

        info!(
            method = %metadata.method,
            width = image.width(),
            height = image.height(),
            total_ms = metadata.timings.total_ms,
            "Cutout finished"
        );
        tracker.report_completion(metadata.timings.clone());

        RemovalResult::new(image, original_dimensions, metadata)
    }
}
