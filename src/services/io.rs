//! Image I/O operations service
//!
//! Reads raw payloads with the upload limit applied and writes results to
//! disk. Decoding is left to [`ImageNormalizer`](crate::utils::ImageNormalizer).

use crate::{
    config::OutputFormat,
    error::{CutoutError, Result},
    services::OutputFormatHandler,
};
use image::RgbaImage;
use std::path::Path;
use tracing::debug;

/// Service for handling image file input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Reject empty or oversized payloads
    ///
    /// # Errors
    /// - `InvalidInput` for an empty payload
    /// - `PayloadTooLarge` when `size` exceeds `limit`
    pub fn check_payload_size(size: usize, limit: usize) -> Result<()> {
        if size == 0 {
            return Err(CutoutError::invalid_input("Empty file"));
        }
        if size > limit {
            return Err(CutoutError::PayloadTooLarge { size, limit });
        }
        Ok(())
    }

    /// Read a file into memory, enforcing the upload limit before reading
    ///
    /// # Errors
    /// - File missing or unreadable
    /// - Empty or oversized file
    ///
    /// # Examples
    /// ```rust,no_run
    /// use garment_cutout::services::ImageIOService;
    ///
    /// let bytes = ImageIOService::read_file("shirt.jpg", 8 * 1024 * 1024)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn read_file<P: AsRef<Path>>(path: P, limit: usize) -> Result<Vec<u8>> {
        let path_ref = path.as_ref();

        let metadata = std::fs::metadata(path_ref)
            .map_err(|e| CutoutError::file_io_error("read image file", path_ref, &e))?;
        let size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        Self::check_payload_size(size, limit)?;

        let bytes = std::fs::read(path_ref)
            .map_err(|e| CutoutError::file_io_error("read image data", path_ref, &e))?;
        debug!(path = %path_ref.display(), bytes = bytes.len(), "Read input file");
        Ok(bytes)
    }

    /// Read an async stream into memory, stopping one byte past the upload limit
    ///
    /// # Errors
    /// - Read failures
    /// - Empty or oversized stream
    pub async fn read_from_reader<R: tokio::io::AsyncRead + Unpin>(
        reader: R,
        limit: usize,
    ) -> Result<Vec<u8>> {
        use tokio::io::AsyncReadExt;

        let mut buffer = Vec::new();
        let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
        reader
            .take(cap)
            .read_to_end(&mut buffer)
            .await
            .map_err(|e| CutoutError::invalid_input(format!("Failed to read from stream: {}", e)))?;

        Self::check_payload_size(buffer.len(), limit)?;
        Ok(buffer)
    }

    /// Save an image, creating the parent directory if needed
    ///
    /// # Errors
    /// - Directory creation, encoding or write failures
    pub fn save_image<P: AsRef<Path>>(
        image: &RgbaImage,
        path: P,
        format: OutputFormat,
    ) -> Result<()> {
        let path_ref = path.as_ref();

        if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| CutoutError::file_io_error("create output directory", parent, &e))?;
        }

        match OutputFormatHandler::image_format(format) {
            Some(image_format) => image.save_with_format(path_ref, image_format)?,
            None => std::fs::write(path_ref, image.as_raw())
                .map_err(|e| CutoutError::file_io_error("write RGBA8 data", path_ref, &e))?,
        }

        debug!(path = %path_ref.display(), %format, "Saved result");
        Ok(())
    }

    /// Check if a file path has a supported input image extension
    #[must_use]
    pub fn is_supported_format<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .is_some_and(|ext| {
                matches!(
                    ext.as_str(),
                    "jpg" | "jpeg" | "png" | "webp" | "tiff" | "tif" | "bmp"
                )
            })
    }
}
