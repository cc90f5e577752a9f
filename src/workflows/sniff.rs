//! Content-type sniffing for datasource URLs

use crate::types::{AppError, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::{debug, warn};

/// Resolves the primary MIME type of a URL, if it can be determined
#[async_trait]
pub trait ContentTypeSniffer: Send + Sync {
    async fn content_type(&self, url: &str) -> Option<String>;
}

/// Sniffs content types with a HEAD request
#[derive(Clone)]
pub struct HttpContentTypeSniffer {
    client: reqwest::Client,
}

impl HttpContentTypeSniffer {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

/// `text/html; charset=utf-8` → `text/html`
pub fn primary_mime_type(header: &str) -> Option<String> {
    let mime = header.split(';').next()?.trim().to_ascii_lowercase();
    (!mime.is_empty()).then_some(mime)
}

#[async_trait]
impl ContentTypeSniffer for HttpContentTypeSniffer {
    async fn content_type(&self, url: &str) -> Option<String> {
        let response = match self.client.head(url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(url, error = %e, "HEAD request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(url, status = %response.status(), "HEAD request returned an error status");
            return None;
        }

        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(primary_mime_type);

        debug!(url, mime = ?mime, "Sniffed content type");
        mime
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_mime_type() {
        assert_eq!(
            primary_mime_type("text/html; charset=utf-8").as_deref(),
            Some("text/html")
        );
        assert_eq!(
            primary_mime_type("Application/PDF").as_deref(),
            Some("application/pdf")
        );
        assert_eq!(primary_mime_type(" ; charset=utf-8"), None);
    }
}
