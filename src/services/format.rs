//! Output format handling service
//!
//! Maps [`OutputFormat`] onto file extensions, MIME types and `image` crate
//! formats, and parses user-supplied format names.

use crate::{
    config::OutputFormat,
    error::{CutoutError, Result},
};
use image::ImageFormat;
use std::path::Path;

/// Service for handling output format conversions
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Get the appropriate file extension for a given output format
    ///
    /// # Examples
    /// ```rust
    /// use garment_cutout::{services::OutputFormatHandler, OutputFormat};
    ///
    /// assert_eq!(OutputFormatHandler::get_extension(OutputFormat::Png), "png");
    /// assert_eq!(OutputFormatHandler::get_extension(OutputFormat::Rgba8), "raw");
    /// ```
    #[must_use]
    pub fn get_extension(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
            OutputFormat::Tiff => "tiff",
            OutputFormat::Rgba8 => "raw",
        }
    }

    /// MIME type used when the encoded bytes are served or embedded
    #[must_use]
    pub fn mime_type(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "image/png",
            OutputFormat::WebP => "image/webp",
            OutputFormat::Tiff => "image/tiff",
            OutputFormat::Rgba8 => "application/octet-stream",
        }
    }

    /// Encoder format in the `image` crate; `None` for raw pixel output
    #[must_use]
    pub fn image_format(format: OutputFormat) -> Option<ImageFormat> {
        match format {
            OutputFormat::Png => Some(ImageFormat::Png),
            OutputFormat::WebP => Some(ImageFormat::WebP),
            OutputFormat::Tiff => Some(ImageFormat::Tiff),
            OutputFormat::Rgba8 => None,
        }
    }

    /// Parse a format name or extension (case-insensitive)
    ///
    /// # Errors
    /// - Unknown format name
    ///
    /// # Examples
    /// ```rust
    /// use garment_cutout::{services::OutputFormatHandler, OutputFormat};
    ///
    /// assert_eq!(OutputFormatHandler::parse("WEBP").unwrap(), OutputFormat::WebP);
    /// assert!(OutputFormatHandler::parse("jpeg").is_err());
    /// ```
    pub fn parse(name: &str) -> Result<OutputFormat> {
        match name.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "webp" => Ok(OutputFormat::WebP),
            "tif" | "tiff" => Ok(OutputFormat::Tiff),
            "raw" | "rgba8" => Ok(OutputFormat::Rgba8),
            other => Err(CutoutError::invalid_config(format!(
                "Unsupported output format '{}' (expected png, webp, tiff or rgba8)",
                other
            ))),
        }
    }

    /// Infer the output format from a path's extension
    #[must_use]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<OutputFormat> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| Self::parse(ext).ok())
    }
}
