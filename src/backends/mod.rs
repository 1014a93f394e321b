//! Learned segmenter implementations
//!
//! - [`CommandSegmenter`]: delegates to an external matting command such as `rembg`
//! - [`NoOpSegmenter`](crate::inference::NoOpSegmenter): always unavailable

pub mod command;

// Test utilities for segmenter testing
#[cfg(test)]
pub mod test_utils;

pub use self::command::{CommandSegmenter, DEFAULT_COMMAND_TIMEOUT};

use crate::inference::{LearnedSegmenter, NoOpSegmenter};
use tracing::info;

/// Create the learned segmenter for an optional command line
///
/// `None` probes for `rembg` on `PATH`; `Some((program, args))` uses that
/// command with the given argument template. An unavailable command is still
/// returned so callers can report it; the processor skips it.
#[must_use]
pub fn create_segmenter(command: Option<(String, Vec<String>)>) -> Box<dyn LearnedSegmenter> {
    let segmenter = match command {
        Some((program, args)) => CommandSegmenter::new(program, args),
        None => CommandSegmenter::rembg(),
    };

    if segmenter.is_available() {
        Box::new(segmenter)
    } else {
        info!(
            program = %segmenter.program().display(),
            "No learned segmenter available, heuristic matte only"
        );
        Box::new(NoOpSegmenter)
    }
}
