//! Learned segmenter abstraction
//!
//! A learned segmenter is an optional collaborator that turns losslessly
//! encoded image bytes into image bytes with a meaningful alpha channel. The
//! processor receives one at construction time; whether it is usable is
//! decided then and not re-probed per call.

use crate::error::{CutoutError, Result};

/// Trait for learned background-removal models
pub trait LearnedSegmenter: Send + Sync {
    /// Name used in logs and result metadata
    fn name(&self) -> &str;

    /// Whether the segmenter can be invoked at all
    fn is_available(&self) -> bool;

    /// Remove the background from a PNG-encoded image
    ///
    /// # Errors
    /// - The segmenter is unavailable
    /// - The segmenter crashed, timed out or produced no output
    fn segment(&self, png_bytes: &[u8]) -> Result<Vec<u8>>;
}

/// Stand-in used when no learned segmenter is installed
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpSegmenter;

impl LearnedSegmenter for NoOpSegmenter {
    fn name(&self) -> &str {
        "none"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn segment(&self, _png_bytes: &[u8]) -> Result<Vec<u8>> {
        Err(CutoutError::segmenter("No learned segmenter installed"))
    }
}
