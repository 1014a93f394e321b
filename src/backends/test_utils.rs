//! Mock learned segmenters for testing the fallback paths
//!
//! None of these spawn processes; each one scripts a single behaviour and
//! records every call so tests can verify whether the segmenter was reached.

use crate::{
    error::{CutoutError, Result},
    inference::LearnedSegmenter,
};
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::{Arc, Mutex};

/// What the mock does when asked to segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    /// Returns the input with every pixel's alpha set to the given value
    Succeed(u8),
    /// Returns a segmenter error
    Fail,
    /// Returns a valid PNG one pixel wider than the input
    WrongDimensions,
    /// Returns bytes that are not an image
    Garbage,
}

/// Scripted learned segmenter
#[derive(Debug, Clone)]
pub struct MockSegmenter {
    behavior: MockBehavior,
    available: bool,
    call_history: Arc<Mutex<Vec<usize>>>,
}

impl MockSegmenter {
    #[must_use]
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            available: true,
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A mock that reports itself unavailable
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(MockBehavior::Fail)
        }
    }

    /// Sizes of the PNG payloads received so far
    pub fn get_call_history(&self) -> Vec<usize> {
        self.call_history.lock().map(|h| h.clone()).unwrap_or_default()
    }

    /// Shared handle to the call history, usable after the mock is boxed
    pub fn history_handle(&self) -> Arc<Mutex<Vec<usize>>> {
        Arc::clone(&self.call_history)
    }

    fn record_call(&self, len: usize) {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(len);
        }
    }
}

fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    image.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
    Ok(buffer)
}

impl LearnedSegmenter for MockSegmenter {
    fn name(&self) -> &str {
        "mock"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn segment(&self, png_bytes: &[u8]) -> Result<Vec<u8>> {
        self.record_call(png_bytes.len());

        match self.behavior {
            MockBehavior::Succeed(alpha) => {
                let mut image = image::load_from_memory(png_bytes)?.to_rgba8();
                for pixel in image.pixels_mut() {
                    pixel[3] = alpha;
                }
                encode_png(&image)
            },
            MockBehavior::Fail => Err(CutoutError::segmenter("Mock segmenter failure")),
            MockBehavior::WrongDimensions => {
                let (width, height) = image::load_from_memory(png_bytes)?.to_rgba8().dimensions();
                encode_png(&RgbaImage::from_pixel(width + 1, height, Rgba([0, 0, 0, 255])))
            },
            MockBehavior::Garbage => Ok(b"definitely not a png".to_vec()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_records_calls() {
        let mock = MockSegmenter::new(MockBehavior::Fail);
        assert!(mock.segment(&[1, 2, 3]).is_err());
        assert_eq!(mock.get_call_history(), vec![3]);
    }

    #[test]
    fn test_succeeding_mock_sets_alpha() {
        let input = encode_png(&RgbaImage::from_pixel(3, 2, Rgba([9, 8, 7, 255]))).unwrap();
        let output = MockSegmenter::new(MockBehavior::Succeed(42)).segment(&input).unwrap();
        let decoded = image::load_from_memory(&output).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert!(decoded.pixels().all(|p| *p == Rgba([9, 8, 7, 42])));
    }
}
