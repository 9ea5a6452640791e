use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use classify::ClassificationResult;
use tracing::info;

use crate::error::ExtractError;
use crate::llm::VisionClient;
use crate::prepare::prepare_image;
use crate::prompt;
use crate::schema::ExtractedRecord;
use crate::service::ExtractionService;
use crate::source::ImageLoader;

/// Extraction backed by a vision model: load, shrink, encode, prompt, parse.
pub struct VisionExtractor {
    client: VisionClient,
    loader: ImageLoader,
    max_image_bytes: usize,
    json_retries: usize,
}

impl VisionExtractor {
    pub fn new(client: VisionClient, loader: ImageLoader, max_image_bytes: usize) -> Self {
        Self {
            client,
            loader,
            max_image_bytes,
            json_retries: 3,
        }
    }

    pub fn with_json_retries(mut self, json_retries: usize) -> Self {
        self.json_retries = json_retries;
        self
    }

    async fn extract_record(&self, reference: &ClassificationResult) -> Result<ExtractedRecord> {
        let bytes = self.loader.load(reference).await?;

        let max_bytes = self.max_image_bytes;
        let prepared = tokio::task::spawn_blocking(move || prepare_image(bytes, max_bytes))
            .await
            .context("Image preparation task failed")??;
        info!(
            mime = prepared.mime_type(),
            bytes = prepared.bytes.len(),
            model = self.client.model(),
            "sending image for data extraction"
        );

        let images = [STANDARD.encode(&prepared.bytes)];
        let json = self
            .client
            .generate_json_with_retry(&prompt::build_extraction_prompt(), &images, self.json_retries)
            .await
            .context("Failed to extract prescription fields after retries")?;

        serde_json::from_str(&json).context("Failed to parse extraction result")
    }
}

#[async_trait]
impl ExtractionService for VisionExtractor {
    async fn extract(&self, reference: &ClassificationResult) -> Result<ExtractedRecord, ExtractError> {
        self.extract_record(reference)
            .await
            .map_err(ExtractError::extraction)
    }
}
