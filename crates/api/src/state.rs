use anyhow::{Context, Result};
use classify::RequestClassifier;
use extract::{
    CatalogMatcher, DOWNLOAD_LIMIT_FACTOR, ExtractionService, FixtureExtractor, ImageLoader,
    Pipeline, TestCatalog, VisionClient, VisionExtractor,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{AppConfig, ExtractionMode};
use crate::metrics::Metrics;
use crate::retry::RetryPolicy;

/// Shared handler state. Nothing in here is mutated per request except the
/// metrics atomics.
#[derive(Clone)]
pub struct AppState {
    pub classifier: RequestClassifier,
    pub pipeline: Pipeline,
    pub retry: Arc<RetryPolicy>,
    pub metrics: Arc<Metrics>,
    pub request_timeout: Duration,
    pub mode: ExtractionMode,
}

impl AppState {
    pub fn new(
        classifier: RequestClassifier,
        pipeline: Pipeline,
        retry: RetryPolicy,
        request_timeout: Duration,
        mode: ExtractionMode,
    ) -> Self {
        Self {
            classifier,
            pipeline,
            retry: Arc::new(retry),
            metrics: Arc::new(Metrics::new()),
            request_timeout,
            mode,
        }
    }

    /// Wire the configured collaborators.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let catalog = match &config.catalog_path {
            Some(path) => TestCatalog::from_file(path).await?,
            None => TestCatalog::default(),
        };
        if catalog.is_empty() {
            warn!("test catalog is empty; every test name will map to NA");
        } else {
            info!(tests = catalog.len(), "test catalog loaded");
        }

        let extraction: Arc<dyn ExtractionService> = match config.mode {
            ExtractionMode::Fixture => Arc::new(FixtureExtractor::with_delay(
                Duration::from_millis(config.fixture.delay_ms),
            )),
            ExtractionMode::Vision => {
                let http = reqwest::Client::builder()
                    .timeout(config.request_timeout())
                    .build()
                    .context("Failed to build HTTP client")?;
                let client =
                    VisionClient::new(config.vision.base_url.clone(), config.vision.model.clone());
                let loader = ImageLoader::new(
                    http,
                    config.max_image_bytes().saturating_mul(DOWNLOAD_LIMIT_FACTOR),
                );
                Arc::new(
                    VisionExtractor::new(client, loader, config.max_image_bytes())
                        .with_json_retries(config.vision.json_retries),
                )
            }
        };
        info!(mode = ?config.mode, "extraction collaborator ready");

        let pipeline = Pipeline::new(extraction, Arc::new(CatalogMatcher::new(catalog)));

        Ok(Self::new(
            RequestClassifier::new(config.classifier.trailing),
            pipeline,
            RetryPolicy::from_config(&config.retry),
            config.request_timeout(),
            config.mode,
        ))
    }
}
