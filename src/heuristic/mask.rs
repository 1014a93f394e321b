//! Binary foreground mask from colour distance with adaptive threshold retry

use crate::config::SegmentationParams;
use crate::types::{AlphaMask, BackgroundColor};
use image::RgbImage;
use tracing::debug;

/// Threshold below which no further retry is attempted
pub const THRESHOLD_FLOOR: u32 = 20;

/// Amount the threshold is lowered on each retry
pub const THRESHOLD_STEP: u32 = 15;

/// Binary mask together with how it was obtained
#[derive(Debug, Clone)]
pub struct MaskBuildOutcome {
    /// Binary mask, every value is 0 or 255
    pub mask: AlphaMask,
    /// Threshold used for the returned mask
    pub threshold: u32,
    /// Number of classification passes, including the first
    pub attempts: u32,
    /// Share of pixels classified as foreground
    pub foreground_fraction: f64,
}

/// Upper bound on retries for a starting threshold
///
/// Each retry lowers the threshold by [`THRESHOLD_STEP`] until it reaches
/// [`THRESHOLD_FLOOR`], so the bound is `ceil((threshold - 20) / 15)`.
#[must_use]
pub fn max_retries(threshold: u32) -> u32 {
    threshold
        .saturating_sub(THRESHOLD_FLOOR)
        .saturating_add(THRESHOLD_STEP - 1)
        / THRESHOLD_STEP
}

/// Next threshold in the retry sequence
#[must_use]
pub fn lowered_threshold(threshold: u32) -> u32 {
    threshold.saturating_sub(THRESHOLD_STEP).max(THRESHOLD_FLOOR)
}

/// Classify each pixel against the background colour at a fixed threshold
///
/// A pixel is foreground when its squared RGB distance to `background`
/// strictly exceeds `threshold²`. Returns the mask and the foreground count.
#[must_use]
pub fn classify_pixels(
    image: &RgbImage,
    background: BackgroundColor,
    threshold: u32,
) -> (AlphaMask, usize) {
    let threshold_sq = threshold.saturating_mul(threshold);
    let mut foreground = 0_usize;

    let data: Vec<u8> = image
        .pixels()
        .map(|pixel| {
            if background.distance_sq(pixel.0) > threshold_sq {
                foreground += 1;
                255
            } else {
                0
            }
        })
        .collect();

    (AlphaMask::new(data, image.dimensions()), foreground)
}

/// Build the binary foreground mask, lowering the threshold while too little is foreground
///
/// The background colour is fixed for the whole call. Retries happen while the
/// foreground fraction is below `params.min_foreground_fraction` and the
/// threshold is above [`THRESHOLD_FLOOR`]; the loop is additionally capped at
/// [`max_retries`] of the starting threshold.
#[must_use]
pub fn build_foreground_mask(
    image: &RgbImage,
    background: BackgroundColor,
    params: &SegmentationParams,
) -> MaskBuildOutcome {
    let total_pixels = u64::from(image.width()) * u64::from(image.height());
    let max_attempts = max_retries(params.threshold) + 1;
    let mut threshold = params.threshold;
    let mut attempts = 1;

    loop {
        let (mask, foreground) = classify_pixels(image, background, threshold);
        let foreground_fraction = if total_pixels == 0 {
            0.0
        } else {
            foreground as f64 / total_pixels as f64
        };

        let retry = foreground_fraction < params.min_foreground_fraction
            && threshold > THRESHOLD_FLOOR
            && attempts < max_attempts;

        if !retry {
            debug!(
                threshold,
                attempts,
                foreground_fraction,
                "Foreground mask built"
            );
            return MaskBuildOutcome {
                mask,
                threshold,
                attempts,
                foreground_fraction,
            };
        }

        let next = lowered_threshold(threshold);
        debug!(
            foreground_fraction,
            min_fraction = params.min_foreground_fraction,
            from = threshold,
            to = next,
            "Foreground fraction too small, lowering threshold"
        );
        threshold = next;
        attempts += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn square_on_white(size: u32, start: u32, end: u32, colour: [u8; 3]) -> RgbImage {
        RgbImage::from_fn(size, size, |x, y| {
            if (start..end).contains(&x) && (start..end).contains(&y) {
                Rgb(colour)
            } else {
                Rgb([255, 255, 255])
            }
        })
    }

    #[test]
    fn test_retry_bound() {
        assert_eq!(max_retries(45), 2);
        assert_eq!(max_retries(35), 1);
        assert_eq!(max_retries(21), 1);
        assert_eq!(max_retries(20), 0);
        assert_eq!(max_retries(5), 0);
        assert_eq!(max_retries(441), 29);
    }

    #[test]
    fn test_threshold_sequence() {
        assert_eq!(lowered_threshold(45), 30);
        assert_eq!(lowered_threshold(30), 20);
        assert_eq!(lowered_threshold(25), 20);
        assert_eq!(lowered_threshold(20), 20);
    }

    #[test]
    fn test_mask_is_binary() {
        let image = RgbImage::from_fn(16, 16, |x, y| Rgb([(x * 16) as u8, (y * 16) as u8, 77]));
        let outcome = build_foreground_mask(&image, BackgroundColor::WHITE, &SegmentationParams::default());
        assert!(outcome.mask.data.iter().all(|&v| v == 0 || v == 255));
        assert_eq!(outcome.mask.dimensions, (16, 16));
    }

    #[test]
    fn test_red_square_fraction() {
        let image = square_on_white(20, 6, 14, [255, 0, 0]);
        let outcome = build_foreground_mask(&image, BackgroundColor::WHITE, &SegmentationParams::default());
        assert!((outcome.foreground_fraction - 0.16).abs() < 1e-9);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.threshold, 45);
        assert_eq!(outcome.mask.get(10, 10), Some(255));
        assert_eq!(outcome.mask.get(0, 0), Some(0));
    }

    #[test]
    fn test_distance_must_strictly_exceed_threshold() {
        // Distance exactly 45 from white along one channel.
        let image = RgbImage::from_pixel(4, 4, Rgb([210, 255, 255]));
        let (mask, count) = classify_pixels(&image, BackgroundColor::WHITE, 45);
        assert_eq!(count, 0);
        assert!(mask.data.iter().all(|&v| v == 0));

        let (_, count) = classify_pixels(&image, BackgroundColor::WHITE, 44);
        assert_eq!(count, 16);
    }

    #[test]
    fn test_uniform_image_bottoms_out_at_floor() {
        let image = RgbImage::from_pixel(5, 5, Rgb([128, 128, 128]));
        let outcome = build_foreground_mask(
            &image,
            BackgroundColor([128, 128, 128]),
            &SegmentationParams::default(),
        );
        assert_eq!(outcome.threshold, THRESHOLD_FLOOR);
        assert_eq!(outcome.attempts, 3);
        assert!(outcome.foreground_fraction.abs() < f64::EPSILON);
    }

    #[test]
    fn test_retry_recovers_faint_garment() {
        // Garment 25 units away from the background: invisible at 45 and 30, found at 20.
        let image = square_on_white(20, 5, 15, [230, 255, 255]);
        let outcome = build_foreground_mask(&image, BackgroundColor::WHITE, &SegmentationParams::default());
        assert_eq!(outcome.threshold, 20);
        assert_eq!(outcome.attempts, 3);
        assert!((outcome.foreground_fraction - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_no_retry_below_floor() {
        let image = RgbImage::from_pixel(3, 3, Rgb([0, 0, 0]));
        let params = SegmentationParams {
            threshold: 10,
            ..SegmentationParams::default()
        };
        let outcome = build_foreground_mask(&image, BackgroundColor([0, 0, 0]), &params);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.threshold, 10);
    }

    #[test]
    fn test_threshold_monotonicity() {
        let image = RgbImage::from_fn(24, 24, |x, y| Rgb([(x * 10) as u8, (y * 10) as u8, ((x + y) * 5) as u8]));
        let background = BackgroundColor([120, 120, 60]);
        let mut previous = 0;
        for threshold in (0..=200).rev().step_by(5) {
            let (_, count) = classify_pixels(&image, background, threshold);
            assert!(count >= previous, "threshold {threshold} reduced foreground");
            previous = count;
        }
    }

    #[test]
    fn test_attempts_never_exceed_bound() {
        for threshold in [20, 21, 35, 45, 100, 441] {
            let image = RgbImage::from_pixel(2, 2, Rgb([9, 9, 9]));
            let params = SegmentationParams {
                threshold,
                min_foreground_fraction: 1.0,
                ..SegmentationParams::default()
            };
            let outcome = build_foreground_mask(&image, BackgroundColor([9, 9, 9]), &params);
            assert!(outcome.attempts <= max_retries(threshold) + 1);
            assert_eq!(outcome.threshold, THRESHOLD_FLOOR);
        }
    }
}
