use anyhow::{Context, Result};
use classify::ClassificationResult;
use tracing::info;

/// Downloads may be this many times larger than the model's image budget;
/// anything over the budget is re-encoded afterwards anyway.
pub const DOWNLOAD_LIMIT_FACTOR: usize = 20;

const DEFAULT_MAX_BYTES: usize = 10 * 1024 * 1024;

/// Fetches raw image bytes for a classified reference.
#[derive(Clone)]
pub struct ImageLoader {
    client: reqwest::Client,
    max_bytes: usize,
}

impl Default for ImageLoader {
    fn default() -> Self {
        Self::new(reqwest::Client::new(), DEFAULT_MAX_BYTES)
    }
}

impl ImageLoader {
    pub fn new(client: reqwest::Client, max_bytes: usize) -> Self {
        Self { client, max_bytes }
    }

    pub async fn load(&self, reference: &ClassificationResult) -> Result<Vec<u8>> {
        match reference {
            ClassificationResult::Local { path } => {
                let read_error = || format!("Failed to read image file: {}", path.display());
                let size = tokio::fs::metadata(path).await.with_context(read_error)?.len();
                self.check_size(size)?;

                let bytes = tokio::fs::read(path).await.with_context(read_error)?;
                info!(path = %path.display(), bytes = bytes.len(), "image loaded from disk");
                Ok(bytes)
            }
            ClassificationResult::Remote { url } => self.fetch(url).await,
        }
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!("Source path must be an HTTP or HTTPS URL: {}", url);
        }

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .context("Failed to fetch image from URL")?;

        if let Some(length) = response.content_length() {
            self.check_size(length)?;
        }

        // Content-Length may be missing or wrong; count what actually arrives.
        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .context("Failed to read image response body")?
        {
            bytes.extend_from_slice(&chunk);
            self.check_size(bytes.len() as u64)?;
        }

        info!(url, bytes = bytes.len(), "image fetched");
        Ok(bytes)
    }

    fn check_size(&self, size: u64) -> Result<()> {
        if size > self.max_bytes as u64 {
            anyhow::bail!(
                "Image is too large: {} bytes exceeds the {} byte limit",
                size,
                self.max_bytes
            );
        }
        Ok(())
    }
}
