use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::prompt;

/// Minimal Ollama client for vision models.
#[derive(Clone)]
pub struct VisionClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "no_images")]
    images: &'a [String],
    stream: bool,
    format: &'a str, // "json" for structured output
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl VisionClient {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url,
            model,
            client: reqwest::Client::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// `images` are base64-encoded, without a data URL prefix.
    pub async fn generate(&self, prompt: &str, images: &[String]) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url.trim_end_matches('/'));

        let request = GenerateRequest {
            model: &self.model,
            prompt,
            images,
            stream: false,
            format: "json",
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Ollama")?
            .error_for_status()
            .context("Ollama request failed")?;

        let generated: GenerateResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        Ok(generated.response)
    }

    /// Generate, asking the model to repair its own output when it is not JSON.
    pub async fn generate_json_with_retry(
        &self,
        prompt: &str,
        images: &[String],
        max_retries: usize,
    ) -> Result<String> {
        for attempt in 0..max_retries {
            let response = self.generate(prompt, images).await?;
            if is_json(&response) {
                return Ok(response);
            }

            warn!(attempt = attempt + 1, max_retries, "model returned invalid JSON");
            if attempt + 1 < max_retries {
                let corrected = self
                    .generate(&prompt::build_retry_prompt(&response), &[])
                    .await?;
                if is_json(&corrected) {
                    return Ok(corrected);
                }
            }
        }

        anyhow::bail!("Failed to get valid JSON after {} retries", max_retries)
    }
}

fn no_images(images: &&[String]) -> bool {
    images.is_empty()
}

fn is_json(text: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(text).is_ok()
}
