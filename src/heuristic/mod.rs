//! Colour-distance heuristic segmentation
//!
//! The pipeline used when no learned segmenter is available (or it fails):
//!
//! 1. [`background::estimate_background_color`] averages the four image corners
//! 2. [`mask::build_foreground_mask`] thresholds the RGB distance to that colour,
//!    lowering the threshold while too little of the image is foreground
//! 3. [`refine::MaskRefiner`] closes small holes and blurs the edge
//! 4. the refined mask becomes the alpha channel of the original pixels

pub mod background;
pub mod mask;
pub mod refine;

pub use background::{corner_regions, estimate_background_color};
pub use mask::{
    build_foreground_mask, classify_pixels, lowered_threshold, max_retries, MaskBuildOutcome,
    THRESHOLD_FLOOR, THRESHOLD_STEP,
};
pub use refine::{
    refine_mask, ImageprocMorphology, MaskRefiner, MorphologyFilter, RefineOutcome,
    EDGE_BLUR_SIGMA,
};

use crate::config::SegmentationParams;
use crate::services::ProcessingStage;
use crate::types::{AlphaMask, HeuristicReport};
use image::{buffer::ConvertBuffer, RgbImage, RgbaImage};
use tracing::{debug, span, Level};

/// Heuristic segmenter configured with fixed parameters
#[derive(Debug)]
pub struct HeuristicSegmenter {
    params: SegmentationParams,
    refiner: MaskRefiner,
}

impl HeuristicSegmenter {
    #[must_use]
    pub fn new(params: SegmentationParams) -> Self {
        let refiner = MaskRefiner::new(params.smoothing_radius);
        Self { params, refiner }
    }

    /// Use a custom refiner; its radius overrides `params.smoothing_radius`
    #[must_use]
    pub fn with_refiner(params: SegmentationParams, refiner: MaskRefiner) -> Self {
        Self { params, refiner }
    }

    #[must_use]
    pub fn params(&self) -> &SegmentationParams {
        &self.params
    }

    /// Compute the refined alpha mask of an RGB image
    #[must_use]
    pub fn compute_mask(&self, rgb: &RgbImage) -> (AlphaMask, HeuristicReport) {
        self.compute_mask_with_progress(rgb, |_| {})
    }

    /// Compute the refined alpha mask, announcing each stage to `on_stage` before it runs
    pub fn compute_mask_with_progress<F>(
        &self,
        rgb: &RgbImage,
        mut on_stage: F,
    ) -> (AlphaMask, HeuristicReport)
    where
        F: FnMut(ProcessingStage),
    {
        let background = {
            on_stage(ProcessingStage::BackgroundEstimation);
            let _span = span!(Level::DEBUG, "background_estimation").entered();
            estimate_background_color(rgb, self.params.sample_size)
        };
        debug!(background = %background, "Estimated background colour");

        let built = {
            on_stage(ProcessingStage::MaskBuilding);
            let _span = span!(Level::DEBUG, "mask_building", threshold = self.params.threshold)
                .entered();
            build_foreground_mask(rgb, background, &self.params)
        };

        let refined = {
            on_stage(ProcessingStage::MaskRefinement);
            let _span = span!(Level::DEBUG, "mask_refinement", radius = self.refiner.radius())
                .entered();
            self.refiner.refine(built.mask)
        };

        let report = HeuristicReport {
            background_color: background,
            final_threshold: built.threshold,
            attempts: built.attempts,
            foreground_fraction: built.foreground_fraction,
            morphology_applied: refined.morphology_applied,
        };

        (refined.mask, report)
    }

    /// Segment an RGBA image; its existing alpha channel is ignored and replaced
    #[must_use]
    pub fn segment(&self, image: &RgbaImage) -> (RgbaImage, HeuristicReport) {
        self.segment_with_progress(image, |_| {})
    }

    /// [`segment`](Self::segment) with stage notifications, ending with compositing
    pub fn segment_with_progress<F>(
        &self,
        image: &RgbaImage,
        mut on_stage: F,
    ) -> (RgbaImage, HeuristicReport)
    where
        F: FnMut(ProcessingStage),
    {
        let rgb: RgbImage = image.convert();
        let (mask, report) = self.compute_mask_with_progress(&rgb, &mut on_stage);

        on_stage(ProcessingStage::Compositing);
        let mut output = image.clone();
        for (pixel, &alpha) in output.pixels_mut().zip(mask.data.iter()) {
            pixel[3] = alpha;
        }

        (output, report)
    }
}

impl Default for HeuristicSegmenter {
    fn default() -> Self {
        Self::new(SegmentationParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_segment_keeps_colours_and_replaces_alpha() {
        let mut image = RgbaImage::from_pixel(30, 30, Rgba([250, 250, 250, 17]));
        for y in 10..20 {
            for x in 10..20 {
                image.put_pixel(x, y, Rgba([20, 40, 160, 17]));
            }
        }

        let (output, report) = HeuristicSegmenter::default().segment(&image);
        assert_eq!(output.dimensions(), (30, 30));
        assert_eq!(report.background_color.0, [250, 250, 250]);
        assert_eq!(report.attempts, 1);
        assert!(report.morphology_applied);

        let centre = output.get_pixel(15, 15);
        assert_eq!(&centre.0[..3], &[20, 40, 160]);
        assert!(centre[3] > 200);

        let corner = output.get_pixel(0, 0);
        assert_eq!(&corner.0[..3], &[250, 250, 250]);
        assert_eq!(corner[3], 0);
    }

    #[test]
    fn test_stage_notifications_in_order() {
        let image = RgbaImage::from_pixel(8, 8, Rgba([255, 255, 255, 255]));
        let mut stages = Vec::new();
        let _ = HeuristicSegmenter::default().segment_with_progress(&image, |s| stages.push(s));
        assert_eq!(
            stages,
            vec![
                ProcessingStage::BackgroundEstimation,
                ProcessingStage::MaskBuilding,
                ProcessingStage::MaskRefinement,
                ProcessingStage::Compositing,
            ]
        );
    }

    #[test]
    fn test_uniform_image_is_transparent() {
        let image = RgbaImage::from_pixel(5, 5, Rgba([128, 128, 128, 255]));
        let (output, report) = HeuristicSegmenter::default().segment(&image);
        assert_eq!(report.final_threshold, THRESHOLD_FLOOR);
        assert!(report.foreground_fraction.abs() < f64::EPSILON);
        assert!(output.pixels().all(|p| p[3] == 0));
    }
}
