//! Background colour estimation from image corners

use crate::types::BackgroundColor;
use image::{GenericImageView, RgbImage};

/// Corner rectangles `(x, y, width, height)` sampled for the background colour
///
/// Each rectangle is clamped to `min(sample_size, width) x min(sample_size, height)`,
/// in the order top-left, top-right, bottom-left, bottom-right. On images smaller
/// than the sample size the rectangles overlap.
#[must_use]
pub fn corner_regions(width: u32, height: u32, sample_size: u32) -> [(u32, u32, u32, u32); 4] {
    let w = sample_size.min(width);
    let h = sample_size.min(height);
    let right = width.saturating_sub(sample_size);
    let bottom = height.saturating_sub(sample_size);

    [(0, 0, w, h), (right, 0, w, h), (0, bottom, w, h), (right, bottom, w, h)]
}

/// Estimate the background colour as the mean of the four corner means
///
/// Corners without pixels are skipped; if none remain the estimate is white.
/// The per-channel average is truncated toward zero.
#[must_use]
pub fn estimate_background_color(image: &RgbImage, sample_size: u32) -> BackgroundColor {
    let (width, height) = image.dimensions();
    let mut sums = [0.0_f64; 3];
    let mut valid_corners = 0_u32;

    for (x, y, w, h) in corner_regions(width, height, sample_size) {
        if let Some(mean) = region_mean(image, x, y, w, h) {
            for (sum, channel_mean) in sums.iter_mut().zip(mean) {
                *sum += channel_mean;
            }
            valid_corners += 1;
        }
    }

    if valid_corners == 0 {
        return BackgroundColor::WHITE;
    }

    let count = f64::from(valid_corners);
    BackgroundColor(sums.map(|sum| (sum / count) as u8))
}

/// Per-channel arithmetic mean of a rectangle, `None` when it holds no pixels
fn region_mean(image: &RgbImage, x: u32, y: u32, width: u32, height: u32) -> Option<[f64; 3]> {
    let pixel_count = u64::from(width) * u64::from(height);
    if pixel_count == 0 {
        return None;
    }

    let region = image.view(x, y, width, height);
    let mut sums = [0_u64; 3];
    for (_, _, pixel) in region.pixels() {
        for (sum, &value) in sums.iter_mut().zip(pixel.0.iter()) {
            *sum += u64::from(value);
        }
    }

    Some(sums.map(|sum| sum as f64 / pixel_count as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_uniform_image_returns_its_colour() {
        let image = RgbImage::from_pixel(40, 30, Rgb([12, 200, 99]));
        assert_eq!(estimate_background_color(&image, 10), BackgroundColor([12, 200, 99]));
    }

    #[test]
    fn test_small_image_is_clamped() {
        let image = RgbImage::from_pixel(5, 5, Rgb([128, 128, 128]));
        assert_eq!(corner_regions(5, 5, 10), [(0, 0, 5, 5); 4]);
        assert_eq!(estimate_background_color(&image, 10), BackgroundColor([128, 128, 128]));
    }

    #[test]
    fn test_single_pixel_image() {
        let image = RgbImage::from_pixel(1, 1, Rgb([1, 2, 3]));
        assert_eq!(estimate_background_color(&image, 10), BackgroundColor([1, 2, 3]));
    }

    #[test]
    fn test_zero_area_image_defaults_to_white() {
        let image = RgbImage::new(0, 0);
        assert_eq!(estimate_background_color(&image, 10), BackgroundColor::WHITE);
    }

    #[test]
    fn test_corner_means_are_averaged() {
        // Each corner gets its own colour; the estimate is the mean of the four.
        let mut image = RgbImage::from_pixel(20, 20, Rgb([0, 0, 0]));
        for (x, y, pixel) in image.enumerate_pixels_mut() {
            let value = match (x < 10, y < 10) {
                (true, true) => 0,
                (false, true) => 100,
                (true, false) => 200,
                (false, false) => 250,
            };
            *pixel = Rgb([value, value, value]);
        }
        // (0 + 100 + 200 + 250) / 4 = 137.5, truncated
        assert_eq!(estimate_background_color(&image, 10), BackgroundColor([137, 137, 137]));
    }

    #[test]
    fn test_centre_pixels_are_ignored() {
        let mut image = RgbImage::from_pixel(50, 50, Rgb([240, 240, 240]));
        for y in 10..40 {
            for x in 10..40 {
                image.put_pixel(x, y, Rgb([0, 0, 255]));
            }
        }
        assert_eq!(estimate_background_color(&image, 10), BackgroundColor([240, 240, 240]));
    }

    #[test]
    fn test_estimation_is_idempotent() {
        let image = RgbImage::from_fn(33, 17, |x, y| Rgb([(x * 7) as u8, (y * 13) as u8, (x ^ y) as u8]));
        let first = estimate_background_color(&image, 10);
        let second = estimate_background_color(&image, 10);
        assert_eq!(first, second);
    }
}
