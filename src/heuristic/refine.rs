//! Mask refinement: morphological closing followed by a soft edge blur

use crate::error::{CutoutError, Result};
use crate::types::AlphaMask;
use image::GrayImage;
use imageproc::distance_transform::Norm;
use tracing::{debug, warn};

/// Standard deviation of the edge-softening blur
pub const EDGE_BLUR_SIGMA: f32 = 1.0;

/// 3x3 morphological filters used by the refiner
pub trait MorphologyFilter: Send + Sync {
    /// Name used in log output
    fn name(&self) -> &'static str;

    /// One pass of a 3x3 maximum filter
    ///
    /// # Errors
    /// - The filter cannot process this mask
    fn dilate(&self, mask: &GrayImage) -> Result<GrayImage>;

    /// One pass of a 3x3 minimum filter
    ///
    /// # Errors
    /// - The filter cannot process this mask
    fn erode(&self, mask: &GrayImage) -> Result<GrayImage>;
}

/// Morphology backed by `imageproc` with a Chebyshev radius of 1 (a 3x3 square)
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageprocMorphology;

impl ImageprocMorphology {
    fn ensure_non_empty(mask: &GrayImage) -> Result<()> {
        if mask.width() == 0 || mask.height() == 0 {
            return Err(CutoutError::processing(
                "Morphological filter requires a non-empty mask",
            ));
        }
        Ok(())
    }
}

impl MorphologyFilter for ImageprocMorphology {
    fn name(&self) -> &'static str {
        "imageproc"
    }

    fn dilate(&self, mask: &GrayImage) -> Result<GrayImage> {
        Self::ensure_non_empty(mask)?;
        Ok(imageproc::morphology::dilate(mask, Norm::LInf, 1))
    }

    fn erode(&self, mask: &GrayImage) -> Result<GrayImage> {
        Self::ensure_non_empty(mask)?;
        Ok(imageproc::morphology::erode(mask, Norm::LInf, 1))
    }
}

/// Result of a refinement pass
#[derive(Debug, Clone)]
pub struct RefineOutcome {
    pub mask: AlphaMask,
    /// False when the closing step failed and only the blur ran
    pub morphology_applied: bool,
}

/// Smooths a binary mask into an anti-aliased matte
pub struct MaskRefiner {
    radius: u32,
    morphology: Box<dyn MorphologyFilter>,
}

impl std::fmt::Debug for MaskRefiner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaskRefiner")
            .field("radius", &self.radius)
            .field("morphology", &self.morphology.name())
            .finish()
    }
}

impl MaskRefiner {
    /// Refiner with `radius` dilate and erode passes using [`ImageprocMorphology`]
    #[must_use]
    pub fn new(radius: u32) -> Self {
        Self::with_morphology(radius, Box::new(ImageprocMorphology))
    }

    /// Refiner with a custom morphology implementation
    #[must_use]
    pub fn with_morphology(radius: u32, morphology: Box<dyn MorphologyFilter>) -> Self {
        Self { radius, morphology }
    }

    #[must_use]
    pub fn radius(&self) -> u32 {
        self.radius
    }

    /// Close the mask (dilate `radius` times, then erode `radius` times) and blur it
    ///
    /// A failing morphology step is logged and skipped; the blur always runs.
    /// Output dimensions equal input dimensions.
    #[must_use]
    pub fn refine(&self, mask: AlphaMask) -> RefineOutcome {
        let dimensions = mask.dimensions;
        let image = match mask.into_image() {
            Ok(image) => image,
            Err(e) => {
                warn!(error = %e, "Mask buffer is inconsistent, returning a transparent matte");
                return RefineOutcome {
                    mask: AlphaMask::filled(dimensions.0, dimensions.1, 0),
                    morphology_applied: false,
                };
            },
        };

        let (closed, morphology_applied) = match self.close(&image) {
            Ok(closed) => (closed, true),
            Err(e) => {
                warn!(
                    filter = self.morphology.name(),
                    error = %e,
                    "Morphological smoothing failed, continuing with blur only"
                );
                (image, false)
            },
        };

        let blurred = if closed.width() == 0 || closed.height() == 0 {
            closed
        } else {
            imageproc::filter::gaussian_blur_f32(&closed, EDGE_BLUR_SIGMA)
        };

        RefineOutcome {
            mask: AlphaMask::from_image(blurred),
            morphology_applied,
        }
    }

    fn close(&self, image: &GrayImage) -> Result<GrayImage> {
        let mut current = image.clone();
        for _ in 0..self.radius {
            current = self.morphology.dilate(&current)?;
        }
        for _ in 0..self.radius {
            current = self.morphology.erode(&current)?;
        }
        debug!(radius = self.radius, "Morphological closing applied");
        Ok(current)
    }
}

impl Default for MaskRefiner {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_SMOOTHING_RADIUS)
    }
}

/// Refine `mask` with the default morphology
#[must_use]
pub fn refine_mask(mask: AlphaMask, radius: u32) -> AlphaMask {
    MaskRefiner::new(radius).refine(mask).mask
}
