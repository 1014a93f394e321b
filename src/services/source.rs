//! Input acquisition: files, stdin, remote URLs and base64 payloads
//!
//! Every source is subject to the same upload limit and emptiness check
//! before any decoding happens.

use crate::{
    config::RemovalConfig,
    error::{CutoutError, Result},
    services::ImageIOService,
};
use base64::Engine;
use reqwest::{Client, Url};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Where the image bytes come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// Local file
    File(PathBuf),
    /// Standard input, read to end
    Stdin,
    /// Remote `http` or `https` URL
    Url(String),
    /// Base64 payload, optionally wrapped in a `data:` URL
    Base64(String),
}

impl InputSource {
    /// Short human-readable label for logs and progress output
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Stdin => "<stdin>".to_string(),
            Self::Url(url) => url.clone(),
            Self::Base64(payload) => format!("<base64, {} chars>", payload.len()),
        }
    }
}

/// Loads raw bytes for an [`InputSource`]
#[derive(Debug, Clone)]
pub struct InputLoader {
    client: Client,
    max_input_bytes: usize,
}

impl InputLoader {
    /// Create a loader using the limits in `config`
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new(config: &RemovalConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()
            .map_err(|e| CutoutError::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_input_bytes: config.max_input_bytes,
        })
    }

    #[must_use]
    pub fn max_input_bytes(&self) -> usize {
        self.max_input_bytes
    }

    /// Read the bytes of `source`
    ///
    /// # Errors
    /// - `InvalidInput` for empty payloads, non-http(s) URLs, failed fetches and bad base64
    /// - `PayloadTooLarge` when the payload exceeds the upload limit
    /// - `Io` for unreadable files
    #[instrument(skip(self), fields(source = %source.display_name()))]
    pub async fn load(&self, source: &InputSource) -> Result<Vec<u8>> {
        let bytes = match source {
            InputSource::File(path) => ImageIOService::read_file(path, self.max_input_bytes)?,
            InputSource::Stdin => {
                ImageIOService::read_from_reader(tokio::io::stdin(), self.max_input_bytes).await?
            },
            InputSource::Url(url) => self.fetch(url).await?,
            InputSource::Base64(payload) => {
                let bytes = decode_base64_payload(payload)?;
                ImageIOService::check_payload_size(bytes.len(), self.max_input_bytes)?;
                bytes
            },
        };

        debug!(bytes = bytes.len(), "Input loaded");
        Ok(bytes)
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let parsed = parse_http_url(url)?;
        info!(url = %parsed, "Fetching remote image");

        let mut response = self
            .client
            .get(parsed.clone())
            .send()
            .await
            .map_err(|e| CutoutError::invalid_input(format!("Failed to fetch remote image: {}", e)))?;

        if !response.status().is_success() {
            return Err(CutoutError::invalid_input(format!(
                "Failed to fetch remote image: HTTP {} for {}",
                response.status(),
                parsed
            )));
        }

        let limit = self.max_input_bytes;
        if let Some(length) = response.content_length() {
            let size = usize::try_from(length).unwrap_or(usize::MAX);
            if size > limit {
                return Err(CutoutError::PayloadTooLarge { size, limit });
            }
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| CutoutError::invalid_input(format!("Failed to read remote image: {}", e)))?
        {
            bytes.extend_from_slice(&chunk);
            if bytes.len() > limit {
                return Err(CutoutError::PayloadTooLarge {
                    size: bytes.len(),
                    limit,
                });
            }
        }

        ImageIOService::check_payload_size(bytes.len(), limit)?;
        Ok(bytes)
    }
}

/// Parse `url` and require an `http` or `https` scheme with a host
///
/// # Errors
/// - Malformed URL or other scheme
pub fn parse_http_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url.trim())
        .map_err(|e| CutoutError::invalid_input(format!("Invalid image URL '{}': {}", url, e)))?;

    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(CutoutError::invalid_input("image_url must be http(s)"));
    }

    Ok(parsed)
}

/// Decode a raw base64 string or a `data:<mime>;base64,<payload>` URL
///
/// ASCII whitespace inside the payload is ignored.
///
/// # Errors
/// - Data URL without a comma separator or without the `;base64` marker
/// - Invalid base64
///
/// # Examples
/// ```rust
/// use garment_cutout::services::source::decode_base64_payload;
///
/// assert_eq!(decode_base64_payload("aGk=").unwrap(), b"hi");
/// assert_eq!(decode_base64_payload("data:image/png;base64,aGk=").unwrap(), b"hi");
/// assert!(decode_base64_payload("data:image/png;base64").is_err());
/// ```
pub fn decode_base64_payload(payload: &str) -> Result<Vec<u8>> {
    let trimmed = payload.trim();

    let encoded = if let Some(rest) = trimmed.strip_prefix("data:") {
        let (header, data) = rest
            .split_once(',')
            .ok_or_else(|| CutoutError::invalid_input("Invalid data URL"))?;
        if !header.ends_with(";base64") {
            return Err(CutoutError::invalid_input(
                "Invalid data URL: only base64 encoded data URLs are supported",
            ));
        }
        data
    } else {
        trimmed
    };

    let compact: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|_| CutoutError::invalid_input("Provided base64_image is not valid base64"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader_with_limit(limit: usize) -> InputLoader {
        let config = RemovalConfig::builder()
            .max_input_bytes(limit)
            .build()
            .unwrap();
        InputLoader::new(&config).unwrap()
    }

    #[test]
    fn test_decode_plain_and_data_url() {
        assert_eq!(decode_base64_payload("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(
            decode_base64_payload("data:image/jpeg;base64,aGVs\nbG8=").unwrap(),
            b"hello"
        );
    }

    #[test]
    fn test_decode_rejects_bad_payloads() {
        for payload in [
            "data:image/png;base64",
            "data:image/png,aGVsbG8=",
            "not base64!!",
            "aGVsbG8",
        ] {
            let err = decode_base64_payload(payload).unwrap_err();
            assert!(matches!(err, CutoutError::InvalidInput(_)), "{payload}");
        }
    }

    #[test]
    fn test_url_scheme_validation() {
        assert!(parse_http_url("https://cdn.example.com/shirt.png").is_ok());
        assert!(parse_http_url("http://localhost:8080/a.jpg").is_ok());
        for url in ["ftp://example.com/a.png", "file:///etc/passwd", "shirt.png", ""] {
            let err = parse_http_url(url).unwrap_err();
            assert!(err.is_client_error(), "{url}");
        }
    }

    #[tokio::test]
    async fn test_base64_source_respects_limit() {
        let loader = loader_with_limit(4);
        let source = InputSource::Base64("aGVsbG8=".to_string());
        assert!(matches!(
            loader.load(&source).await,
            Err(CutoutError::PayloadTooLarge { size: 5, limit: 4 })
        ));

        let empty = InputSource::Base64(String::new());
        assert!(matches!(
            loader.load(&empty).await,
            Err(CutoutError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_non_http_url_is_rejected_before_fetch() {
        let loader = loader_with_limit(1024);
        let err = loader
            .load(&InputSource::Url("gopher://example.com/shirt".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid input: image_url must be http(s)");
    }

    #[tokio::test]
    async fn test_file_source() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("shirt.bin");
        std::fs::write(&path, b"abc").unwrap();

        let loader = loader_with_limit(1024);
        let bytes = loader.load(&InputSource::File(path)).await.unwrap();
        assert_eq!(bytes, b"abc");
    }

    #[test]
    fn test_display_names() {
        assert_eq!(InputSource::Stdin.display_name(), "<stdin>");
        assert_eq!(
            InputSource::Base64("abcd".to_string()).display_name(),
            "<base64, 4 chars>"
        );
    }
}
