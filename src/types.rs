//! Core types for garment cutout operations

use crate::{
    config::OutputFormat,
    error::{CutoutError, Result},
    services::{ImageIOService, OutputFormatHandler},
};
use base64::Engine;
use chrono::{DateTime, Utc};
use image::{GrayImage, ImageBuffer, Luma, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Estimated representative colour of the non-subject image area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackgroundColor(pub [u8; 3]);

impl BackgroundColor {
    /// Fallback used when no corner could be sampled
    pub const WHITE: Self = Self([255, 255, 255]);

    /// Squared Euclidean distance to an RGB pixel
    #[must_use]
    pub fn distance_sq(&self, rgb: [u8; 3]) -> u32 {
        self.0
            .iter()
            .zip(rgb.iter())
            .map(|(&a, &b)| {
                let d = i32::from(a) - i32::from(b);
                (d * d) as u32
            })
            .sum()
    }
}

impl std::fmt::Display for BackgroundColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "rgb({r}, {g}, {b})")
    }
}

/// Single-channel opacity mask (0 = background, 255 = foreground)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlphaMask {
    /// Mask data in row-major order
    pub data: Vec<u8>,

    /// Mask dimensions (width, height)
    pub dimensions: (u32, u32),
}

impl AlphaMask {
    /// Create a new alpha mask
    #[must_use]
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Self {
        Self { data, dimensions }
    }

    /// Create a mask with every pixel set to `value`
    #[must_use]
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self::new(vec![value; width as usize * height as usize], (width, height))
    }

    /// Create mask from a grayscale image
    #[must_use]
    pub fn from_image(image: GrayImage) -> Self {
        let dimensions = image.dimensions();
        Self::new(image.into_raw(), dimensions)
    }

    /// Convert mask into a grayscale image
    ///
    /// # Errors
    /// - Buffer length does not match the recorded dimensions
    pub fn into_image(self) -> Result<GrayImage> {
        let (width, height) = self.dimensions;
        ImageBuffer::<Luma<u8>, Vec<u8>>::from_raw(width, height, self.data).ok_or_else(|| {
            CutoutError::processing(format!(
                "Mask buffer does not match dimensions {}x{}",
                width, height
            ))
        })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.dimensions.0
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.dimensions.1
    }

    /// Opacity at `(x, y)`, `None` outside the mask
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        self.data
            .get(y as usize * self.width() as usize + x as usize)
            .copied()
    }

    /// Mean opacity over all pixels
    #[must_use]
    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let sum: u64 = self.data.iter().map(|&v| u64::from(v)).sum();
        sum as f64 / self.data.len() as f64
    }

    /// Get mask statistics
    #[must_use]
    pub fn statistics(&self) -> MaskStatistics {
        let total_pixels = self.data.len();
        let foreground_pixels = self.data.iter().filter(|&&x| x > 127).count();
        let background_pixels = total_pixels - foreground_pixels;
        let ratio = |count: usize| {
            if total_pixels == 0 {
                0.0
            } else {
                count as f64 / total_pixels as f64
            }
        };

        MaskStatistics {
            total_pixels,
            foreground_pixels,
            background_pixels,
            foreground_ratio: ratio(foreground_pixels),
            background_ratio: ratio(background_pixels),
            mean_alpha: self.mean(),
        }
    }

    /// Save mask as grayscale PNG
    ///
    /// # Errors
    /// - Buffer/dimension mismatch
    /// - File write or encoding failures
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.clone()
            .into_image()?
            .save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }
}

/// Summary statistics of an alpha mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskStatistics {
    pub total_pixels: usize,
    pub foreground_pixels: usize,
    pub background_pixels: usize,
    pub foreground_ratio: f64,
    pub background_ratio: f64,
    pub mean_alpha: f64,
}

/// Which path produced the alpha channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "segmenter")]
pub enum SegmentationMethod {
    /// Learned segmenter, identified by name
    Learned(String),
    /// Colour-distance heuristic matte
    Heuristic,
    /// Background removal disabled; image converted to RGBA unchanged
    Passthrough,
}

impl std::fmt::Display for SegmentationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Learned(name) => write!(f, "learned ({name})"),
            Self::Heuristic => write!(f, "heuristic"),
            Self::Passthrough => write!(f, "passthrough"),
        }
    }
}

/// Diagnostics recorded by the heuristic pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeuristicReport {
    /// Background colour estimated from the corners (fixed across retries)
    pub background_color: BackgroundColor,
    /// Threshold the final mask was built with
    pub final_threshold: u32,
    /// Number of mask builds, including the first
    pub attempts: u32,
    /// Foreground fraction of the final binary mask
    pub foreground_fraction: f64,
    /// Whether the morphological closing ran
    pub morphology_applied: bool,
}

/// Detailed timing breakdown (milliseconds)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Decoding and downscaling
    pub normalize_ms: u64,
    /// Learned segmenter call, including failed attempts
    pub learned_ms: u64,
    /// Heuristic pipeline
    pub heuristic_ms: u64,
    /// Whole request
    pub total_ms: u64,
}

/// Processing metadata attached to every result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    pub method: SegmentationMethod,
    pub timings: ProcessingTimings,
    pub processed_at: DateTime<Utc>,
    pub heuristic: Option<HeuristicReport>,
    /// Reason the learned segmenter was abandoned, if it was attempted
    pub fallback_reason: Option<String>,
}

impl ProcessingMetadata {
    #[must_use]
    pub fn new(method: SegmentationMethod) -> Self {
        Self {
            method,
            timings: ProcessingTimings::default(),
            processed_at: Utc::now(),
            heuristic: None,
            fallback_reason: None,
        }
    }
}

/// Result of a cutout operation
#[derive(Debug, Clone)]
pub struct RemovalResult {
    /// RGBA image with the new alpha channel
    pub image: RgbaImage,

    /// Decoded input dimensions before downscaling
    pub original_dimensions: (u32, u32),

    /// Processing metadata
    pub metadata: ProcessingMetadata,
}

impl RemovalResult {
    /// Create a new removal result
    #[must_use]
    pub fn new(
        image: RgbaImage,
        original_dimensions: (u32, u32),
        metadata: ProcessingMetadata,
    ) -> Self {
        Self {
            image,
            original_dimensions,
            metadata,
        }
    }

    /// Output dimensions
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Alpha channel of the result as a mask
    #[must_use]
    pub fn alpha_mask(&self) -> AlphaMask {
        let data = self.image.pixels().map(|p| p[3]).collect();
        AlphaMask::new(data, self.image.dimensions())
    }

    /// Encode as bytes in the specified format
    ///
    /// # Errors
    /// - Encoder failures (including formats compiled out of the `image` crate)
    pub fn to_bytes(&self, format: OutputFormat) -> Result<Vec<u8>> {
        let Some(image_format) = OutputFormatHandler::image_format(format) else {
            return Ok(self.image.as_raw().clone());
        };

        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        self.image.write_to(&mut cursor, image_format)?;
        Ok(buffer)
    }

    /// Encode as PNG
    ///
    /// # Errors
    /// - PNG encoder failures
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        self.to_bytes(OutputFormat::Png)
    }

    /// PNG bytes, standard base64 encoded
    ///
    /// # Errors
    /// - PNG encoder failures
    pub fn to_png_base64(&self) -> Result<String> {
        Ok(base64::engine::general_purpose::STANDARD.encode(self.to_png_bytes()?))
    }

    /// `data:image/png;base64,...` URL of the result
    ///
    /// # Errors
    /// - PNG encoder failures
    pub fn to_data_url(&self) -> Result<String> {
        Ok(format!("data:image/png;base64,{}", self.to_png_base64()?))
    }

    /// Save in the specified format, creating missing parent directories
    ///
    /// # Errors
    /// - Directory creation, file write or encoding failures
    pub fn save<P: AsRef<Path>>(&self, path: P, format: OutputFormat) -> Result<()> {
        ImageIOService::save_image(&self.image, path, format)
    }

    /// Save as PNG
    ///
    /// # Errors
    /// - File write or encoding failures
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.save(path, OutputFormat::Png)
    }
}

/// JSON payload mirroring the upload response of the try-on service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GarmentResponse {
    pub ok: bool,
    pub garment_png_b64: String,
    pub garment_data_url: String,
    pub garment_type: String,
    pub gender: String,
}

impl GarmentResponse {
    pub const DEFAULT_GARMENT_TYPE: &'static str = "upper";
    pub const DEFAULT_GENDER: &'static str = "male";

    /// Build the response for a finished cutout
    ///
    /// Empty garment type or gender fall back to the service defaults.
    ///
    /// # Errors
    /// - PNG encoder failures
    pub fn from_result(result: &RemovalResult, garment_type: &str, gender: &str) -> Result<Self> {
        let garment_png_b64 = result.to_png_base64()?;
        let garment_data_url = format!("data:image/png;base64,{garment_png_b64}");
        let or_default = |value: &str, default: &str| {
            if value.is_empty() {
                default.to_string()
            } else {
                value.to_string()
            }
        };

        Ok(Self {
            ok: true,
            garment_png_b64,
            garment_data_url,
            garment_type: or_default(garment_type, Self::DEFAULT_GARMENT_TYPE),
            gender: or_default(gender, Self::DEFAULT_GENDER),
        })
    }
}
