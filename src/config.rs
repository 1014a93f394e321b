//! Configuration types for garment cutout operations

use serde::{Deserialize, Serialize};

/// Default colour distance threshold (Euclidean, RGB space)
pub const DEFAULT_THRESHOLD: u32 = 45;

/// Default number of dilate/erode passes in the mask refiner
pub const DEFAULT_SMOOTHING_RADIUS: u32 = 3;

/// Default minimum share of pixels that must be classified as foreground
pub const DEFAULT_MIN_FOREGROUND_FRACTION: f64 = 0.001;

/// Default edge length of the corner squares sampled for the background colour
pub const DEFAULT_SAMPLE_SIZE: u32 = 10;

/// Default bound on the larger image side before downscaling
pub const DEFAULT_MAX_DIMENSION: u32 = 2048;

/// Default upload limit (8 MiB)
pub const DEFAULT_MAX_INPUT_BYTES: usize = 8 * 1024 * 1024;

/// Default timeout for remote image fetches
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 8;

/// Largest possible distance between two RGB colours, rounded down
pub const MAX_COLOR_DISTANCE: u32 = 441;

/// Upper bound on smoothing passes accepted by validation
pub const MAX_SMOOTHING_RADIUS: u32 = 32;

/// Parameters of the heuristic segmentation pipeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentationParams {
    /// Colour distance above which a pixel counts as foreground
    pub threshold: u32,
    /// Number of 3x3 dilate passes followed by the same number of erode passes
    pub smoothing_radius: u32,
    /// Foreground fraction below which the threshold is lowered and the mask rebuilt
    pub min_foreground_fraction: f64,
    /// Corner sample edge length for background colour estimation
    pub sample_size: u32,
}

impl Default for SegmentationParams {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            smoothing_radius: DEFAULT_SMOOTHING_RADIUS,
            min_foreground_fraction: DEFAULT_MIN_FOREGROUND_FRACTION,
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }
}

impl SegmentationParams {
    /// Validate parameter ranges
    ///
    /// # Errors
    /// - Threshold above the largest possible RGB distance
    /// - Smoothing radius above [`MAX_SMOOTHING_RADIUS`]
    /// - Minimum foreground fraction outside `[0, 1]` or not finite
    /// - Zero sample size
    pub fn validate(&self) -> crate::Result<()> {
        if self.threshold > MAX_COLOR_DISTANCE {
            return Err(crate::error::CutoutError::config_value_error(
                "threshold",
                self.threshold,
                "0-441",
                Some(DEFAULT_THRESHOLD),
            ));
        }

        if self.smoothing_radius > MAX_SMOOTHING_RADIUS {
            return Err(crate::error::CutoutError::config_value_error(
                "smoothing radius",
                self.smoothing_radius,
                "0-32",
                Some(DEFAULT_SMOOTHING_RADIUS),
            ));
        }

        if !self.min_foreground_fraction.is_finite()
            || !(0.0..=1.0).contains(&self.min_foreground_fraction)
        {
            return Err(crate::error::CutoutError::config_value_error(
                "minimum foreground fraction",
                self.min_foreground_fraction,
                "0.0-1.0",
                Some(DEFAULT_MIN_FOREGROUND_FRACTION),
            ));
        }

        if self.sample_size == 0 {
            return Err(crate::error::CutoutError::config_value_error(
                "sample size",
                self.sample_size,
                ">= 1",
                Some(DEFAULT_SAMPLE_SIZE),
            ));
        }

        Ok(())
    }
}

/// Output image format options
///
/// Every variant keeps the alpha channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// PNG with alpha channel transparency
    Png,
    /// Lossless WebP with alpha channel transparency
    WebP,
    /// TIFF with alpha channel transparency
    Tiff,
    /// Raw RGBA8 pixel data (4 bytes per pixel)
    Rgba8,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Png
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Png => write!(f, "png"),
            Self::WebP => write!(f, "webp"),
            Self::Tiff => write!(f, "tiff"),
            Self::Rgba8 => write!(f, "rgba8"),
        }
    }
}

/// Configuration for a cutout request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovalConfig {
    /// Heuristic segmentation parameters
    pub segmentation: SegmentationParams,

    /// Larger image side is downscaled to this value when exceeded
    pub max_dimension: u32,

    /// Try the learned segmenter before the heuristic matte
    pub use_learned_segmenter: bool,

    /// Remove the background at all; when false the image is only converted to RGBA
    pub remove_background: bool,

    /// Output format
    pub output_format: OutputFormat,

    /// Upload size limit for raw input payloads
    pub max_input_bytes: usize,

    /// Timeout for fetching remote images
    pub fetch_timeout_secs: u64,
}

impl Default for RemovalConfig {
    fn default() -> Self {
        Self {
            segmentation: SegmentationParams::default(),
            max_dimension: DEFAULT_MAX_DIMENSION,
            use_learned_segmenter: true,
            remove_background: true,
            output_format: OutputFormat::default(),
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
        }
    }
}

impl RemovalConfig {
    /// Create a new configuration builder for fluent API construction
    ///
    /// # Examples
    ///
    /// ```rust
    /// use garment_cutout::{OutputFormat, RemovalConfig};
    ///
    /// let config = RemovalConfig::builder()
    ///     .threshold(60)
    ///     .smoothing_radius(2)
    ///     .output_format(OutputFormat::Png)
    ///     .use_learned_segmenter(false)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.segmentation.threshold, 60);
    /// ```
    #[must_use]
    pub fn builder() -> RemovalConfigBuilder {
        RemovalConfigBuilder::default()
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Invalid segmentation parameters
    /// - Zero maximum dimension
    /// - Zero upload limit
    ///
    /// # Examples
    ///
    /// ```rust
    /// use garment_cutout::RemovalConfig;
    ///
    /// let mut config = RemovalConfig::default();
    /// assert!(config.validate().is_ok());
    ///
    /// config.max_dimension = 0;
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> crate::Result<()> {
        self.segmentation.validate()?;

        if self.max_dimension == 0 {
            return Err(crate::error::CutoutError::config_value_error(
                "maximum dimension",
                self.max_dimension,
                ">= 1",
                Some(DEFAULT_MAX_DIMENSION),
            ));
        }

        if self.max_input_bytes == 0 {
            return Err(crate::error::CutoutError::config_value_error(
                "maximum input bytes",
                self.max_input_bytes,
                ">= 1",
                Some(DEFAULT_MAX_INPUT_BYTES),
            ));
        }

        Ok(())
    }
}

/// Builder for `RemovalConfig`
#[derive(Debug, Default)]
pub struct RemovalConfigBuilder {
    config: RemovalConfig,
}

impl RemovalConfigBuilder {
    /// Replace all segmentation parameters at once
    #[must_use]
    pub fn segmentation(mut self, params: SegmentationParams) -> Self {
        self.config.segmentation = params;
        self
    }

    /// Set colour distance threshold
    #[must_use]
    pub fn threshold(mut self, threshold: u32) -> Self {
        self.config.segmentation.threshold = threshold;
        self
    }

    /// Set number of smoothing passes
    #[must_use]
    pub fn smoothing_radius(mut self, radius: u32) -> Self {
        self.config.segmentation.smoothing_radius = radius;
        self
    }

    /// Set minimum foreground fraction
    #[must_use]
    pub fn min_foreground_fraction(mut self, fraction: f64) -> Self {
        self.config.segmentation.min_foreground_fraction = fraction;
        self
    }

    /// Set corner sample size for background estimation
    #[must_use]
    pub fn sample_size(mut self, sample_size: u32) -> Self {
        self.config.segmentation.sample_size = sample_size;
        self
    }

    /// Set maximum image dimension
    #[must_use]
    pub fn max_dimension(mut self, max_dimension: u32) -> Self {
        self.config.max_dimension = max_dimension;
        self
    }

    /// Enable or disable the learned segmenter attempt
    #[must_use]
    pub fn use_learned_segmenter(mut self, enabled: bool) -> Self {
        self.config.use_learned_segmenter = enabled;
        self
    }

    /// Enable or disable background removal entirely
    #[must_use]
    pub fn remove_background(mut self, enabled: bool) -> Self {
        self.config.remove_background = enabled;
        self
    }

    /// Set output format
    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    /// Set upload size limit
    #[must_use]
    pub fn max_input_bytes(mut self, bytes: usize) -> Self {
        self.config.max_input_bytes = bytes;
        self
    }

    /// Set remote fetch timeout
    #[must_use]
    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs;
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    /// - Any validation failure reported by [`RemovalConfig::validate`]
    pub fn build(self) -> crate::Result<RemovalConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
