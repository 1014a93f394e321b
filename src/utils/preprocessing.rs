//! Input normalization: decode arbitrary image bytes and bound the raster size
//!
//! Everything downstream works on an RGBA raster whose larger side is at most
//! the configured maximum dimension.

use crate::error::{CutoutError, Result};
use image::{imageops::FilterType, DynamicImage, RgbaImage};
use tracing::{debug, info};

/// Decoded and size-bounded input
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    /// RGBA raster, larger side at most the maximum dimension
    pub image: RgbaImage,
    /// Dimensions as decoded, before any downscaling
    pub original_dimensions: (u32, u32),
}

impl NormalizedImage {
    #[must_use]
    pub fn was_downscaled(&self) -> bool {
        self.image.dimensions() != self.original_dimensions
    }
}

/// Decodes and downscales input images
#[derive(Debug, Clone, Copy)]
pub struct ImageNormalizer {
    max_dimension: u32,
}

impl ImageNormalizer {
    /// Create a normalizer bounding the larger side to `max_dimension`
    ///
    /// # Errors
    /// - `max_dimension` is zero
    pub fn new(max_dimension: u32) -> Result<Self> {
        if max_dimension == 0 {
            return Err(CutoutError::config_value_error(
                "maximum dimension",
                max_dimension,
                ">= 1",
                Some(crate::config::DEFAULT_MAX_DIMENSION),
            ));
        }
        Ok(Self { max_dimension })
    }

    #[must_use]
    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// Target size for `(width, height)`, or `None` when no downscale is needed
    ///
    /// The larger side becomes exactly `max_dimension`; the other side is
    /// scaled by the same factor, rounded down, and kept at least 1.
    #[must_use]
    pub fn scaled_dimensions(&self, width: u32, height: u32) -> Option<(u32, u32)> {
        let larger = width.max(height);
        if larger <= self.max_dimension {
            return None;
        }

        let scale = |side: u32| -> u32 {
            let scaled = u64::from(side) * u64::from(self.max_dimension) / u64::from(larger);
            u32::try_from(scaled).unwrap_or(self.max_dimension).max(1)
        };

        Some((scale(width), scale(height)))
    }

    /// Decode bytes in any supported format
    ///
    /// # Errors
    /// - `Decode` when the bytes are not a recognisable image
    pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
        image::load_from_memory(bytes).map_err(|e| {
            debug!(error = %e, bytes = bytes.len(), "Input bytes failed to decode");
            CutoutError::decode(e.to_string())
        })
    }

    /// Convert to RGBA and downscale with Lanczos3 when the larger side exceeds the maximum
    ///
    /// # Errors
    /// - `Decode` for a zero-area image
    pub fn normalize_image(&self, image: &DynamicImage) -> Result<NormalizedImage> {
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return Err(CutoutError::decode(format!(
                "Image has zero area ({}x{})",
                width, height
            )));
        }

        let image = match self.scaled_dimensions(width, height) {
            Some((new_width, new_height)) => {
                info!(
                    "Downscaling image from ({},{}) to ({},{})",
                    width, height, new_width, new_height
                );
                image::imageops::resize(&rgba, new_width, new_height, FilterType::Lanczos3)
            },
            None => rgba,
        };

        Ok(NormalizedImage {
            image,
            original_dimensions: (width, height),
        })
    }

    /// Decode and normalize in one step
    ///
    /// # Errors
    /// - `Decode` for unreadable or zero-area images
    ///
    /// # Examples
    /// ```rust
    /// use garment_cutout::utils::ImageNormalizer;
    ///
    /// let normalizer = ImageNormalizer::new(2048).unwrap();
    /// assert!(normalizer.normalize_bytes(b"definitely not an image").is_err());
    /// ```
    pub fn normalize_bytes(&self, bytes: &[u8]) -> Result<NormalizedImage> {
        let decoded = Self::decode(bytes)?;
        self.normalize_image(&decoded)
    }

    /// Decode and normalize, returning only the raster
    ///
    /// # Errors
    /// - `Decode` for unreadable or zero-area images
    pub fn normalize(&self, bytes: &[u8]) -> Result<RgbaImage> {
        Ok(self.normalize_bytes(bytes)?.image)
    }
}

impl Default for ImageNormalizer {
    fn default() -> Self {
        Self {
            max_dimension: crate::config::DEFAULT_MAX_DIMENSION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba};
    use std::io::Cursor;

    fn png_bytes(image: &DynamicImage) -> Vec<u8> {
        let mut buffer = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[test]
    fn test_scaled_dimensions() {
        let normalizer = ImageNormalizer::default();
        assert_eq!(normalizer.scaled_dimensions(2048, 1000), None);
        assert_eq!(normalizer.scaled_dimensions(100, 100), None);
        assert_eq!(normalizer.scaled_dimensions(4096, 1000), Some((2048, 500)));
        assert_eq!(normalizer.scaled_dimensions(3000, 2000), Some((2048, 1365)));
        assert_eq!(normalizer.scaled_dimensions(1001, 3003), Some((682, 2048)));
    }

    #[test]
    fn test_extreme_aspect_ratio_keeps_one_pixel() {
        let normalizer = ImageNormalizer::new(10).unwrap();
        assert_eq!(normalizer.scaled_dimensions(1000, 1), Some((10, 1)));
        assert_eq!(normalizer.scaled_dimensions(1, 1000), Some((1, 10)));
    }

    #[test]
    fn test_zero_max_dimension_rejected() {
        assert!(matches!(
            ImageNormalizer::new(0),
            Err(CutoutError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_small_image_passes_through() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(20, 10, Rgb([1, 2, 3])));
        let normalized = ImageNormalizer::default()
            .normalize_bytes(&png_bytes(&image))
            .unwrap();
        assert_eq!(normalized.image.dimensions(), (20, 10));
        assert!(!normalized.was_downscaled());
        assert!(normalized.image.pixels().all(|p| *p == Rgba([1, 2, 3, 255])));
    }

    #[test]
    fn test_large_image_is_downscaled() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(300, 120, Rgb([200, 10, 10])));
        let normalized = ImageNormalizer::new(100)
            .unwrap()
            .normalize_image(&image)
            .unwrap();
        assert_eq!(normalized.image.dimensions(), (100, 40));
        assert_eq!(normalized.original_dimensions, (300, 120));
        assert!(normalized.was_downscaled());
    }

    #[test]
    fn test_rgba_input_keeps_alpha() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(3, 3, Rgba([5, 6, 7, 80])));
        let normalized = ImageNormalizer::default().normalize_image(&image).unwrap();
        assert_eq!(normalized.image.get_pixel(1, 1), &Rgba([5, 6, 7, 80]));
    }

    #[test]
    fn test_corrupt_bytes_are_decode_errors() {
        let normalizer = ImageNormalizer::default();
        for bytes in [&b""[..], b"GIF89a", b"\x89PNG\r\n\x1a\ntruncated"] {
            let err = normalizer.normalize_bytes(bytes).unwrap_err();
            assert!(matches!(err, CutoutError::Decode(_)));
            assert!(err.is_client_error());
        }
    }

    #[test]
    fn test_zero_area_rejected() {
        let image = DynamicImage::ImageRgba8(RgbaImage::new(0, 5));
        assert!(matches!(
            ImageNormalizer::default().normalize_image(&image),
            Err(CutoutError::Decode(_))
        ));
    }
}
