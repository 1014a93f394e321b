//! Error types for garment cutout operations

use thiserror::Error;

/// Result type alias for garment cutout operations
pub type Result<T> = std::result::Result<T, CutoutError>;

/// Error taxonomy for the cutout pipeline
///
/// Only decode, input-validation, configuration and I/O errors are ever
/// returned to callers. `Segmenter` errors are produced by learned segmenters
/// and recovered inside the processor by falling back to the heuristic matte.
#[derive(Error, Debug)]
pub enum CutoutError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image encoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Input bytes are not a valid image
    #[error("File is not a valid image: {0}")]
    Decode(String),

    /// Caller supplied an unusable payload (empty file, bad URL, bad base64)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Payload exceeds the configured upload limit
    #[error("Payload too large: {size} bytes (limit {limit} bytes)")]
    PayloadTooLarge { size: usize, limit: usize },

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Learned segmenter failure (unavailable, crashed, malformed output)
    #[error("Segmenter error: {0}")]
    Segmenter(String),

    /// Pipeline processing errors
    #[error("Processing error: {0}")]
    Processing(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CutoutError {
    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new segmenter error
    pub fn segmenter<S: Into<String>>(msg: S) -> Self {
        Self::Segmenter(msg.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Whether the failure was caused by the caller's input rather than the service
    ///
    /// Maps onto the 4xx family of an HTTP front end: decode failures,
    /// validation failures and oversized payloads.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Decode(_)
                | Self::InvalidInput(_)
                | Self::PayloadTooLarge { .. }
                | Self::InvalidConfig(_)
        )
    }
}
