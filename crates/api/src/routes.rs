use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::{get, post},
};
use classify::ClassifyError;
use extract::{ExtractError, ExtractionResponse};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use crate::config::ExtractionMode;
use crate::error::ApiError;
use crate::metrics::{MetricsSnapshot, TimedOperation};
use crate::state::AppState;

#[derive(Debug, Deserialize, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub mode: ExtractionMode,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/extract_and_map_tests_url/", post(extract_and_map_tests))
        .route("/health", get(health_check))
        .route("/stats", get(get_stats))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Classify the reference, run extraction and matching, and return the
/// combined payload. Everything logged for one call shares a `request_id`.
async fn extract_and_map_tests(
    State(state): State<AppState>,
    body: Result<Json<ImageUrl>, JsonRejection>,
) -> Result<Json<ExtractionResponse>, ApiError> {
    let span = info_span!("extract_request", request_id = %Uuid::new_v4());
    let timer = TimedOperation::start();

    let result = async {
        let result = process(&state, body).await;
        if let Err(e) = &result {
            e.log();
        }
        result
    }
    .instrument(span)
    .await;

    state.metrics.record_request(result.is_ok(), timer.elapsed());
    result.map(Json)
}

async fn process(
    state: &AppState,
    body: Result<Json<ImageUrl>, JsonRejection>,
) -> Result<ExtractionResponse, ApiError> {
    let Json(ImageUrl { url }) =
        body.map_err(|rejection| ApiError::InvalidReference(rejection.body_text()))?;
    info!(url = %url, "received request for image processing");

    let classified = state.classifier.classify(&url).inspect_err(|e| {
        if matches!(e, ClassifyError::LocalPathNotFound { .. }) {
            state.metrics.record_not_found();
        }
    })?;
    state.metrics.record_classification(&classified);
    info!(reference = %classified, "reference classified");

    let pipeline = state.pipeline.clone();
    let retry = state.retry.clone();
    let mut task = tokio::spawn(
        async move {
            retry
                .retry("extract_and_map", ExtractError::is_retryable, || {
                    pipeline.run(&classified)
                })
                .await
        }
        .in_current_span(),
    );

    let response = match tokio::time::timeout(state.request_timeout, &mut task).await {
        Ok(Ok(outcome)) => outcome?,
        // A panicking collaborator lands here.
        Ok(Err(join_error)) => {
            return Err(ApiError::UnexpectedFailure(
                anyhow::Error::new(join_error).context("extraction task failed"),
            ));
        }
        Err(_) => {
            task.abort();
            return Err(ApiError::UpstreamFailure(ExtractError::ExtractionFailed(
                format!("timed out after {}s", state.request_timeout.as_secs()),
            )));
        }
    };

    info!(
        mapped_tests = response.mapped_tests.len(),
        "extraction and mapping complete"
    );
    Ok(response)
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        mode: state.mode,
    })
}

async fn get_stats(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorBody;
    use crate::retry::RetryPolicy;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use classify::{ClassificationResult, RequestClassifier, TrailingContent};
    use extract::{
        CatalogMatcher, ExtractedRecord, ExtractionService, FixtureExtractor, ImageLoader,
        Pipeline, TestCatalog, VisionClient, VisionExtractor,
    };
    use pretty_assertions::assert_eq;
    use serde::de::DeserializeOwned;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tower::ServiceExt;

    const ENDPOINT: &str = "/extract_and_map_tests_url/";

    fn state_with(extraction: Arc<dyn ExtractionService>, trailing: TrailingContent) -> AppState {
        let pipeline = Pipeline::new(
            extraction,
            Arc::new(CatalogMatcher::new(TestCatalog::default())),
        );
        AppState::new(
            RequestClassifier::new(trailing),
            pipeline,
            RetryPolicy::new(2, 1, 1),
            Duration::from_secs(5),
            ExtractionMode::Fixture,
        )
    }

    fn fixture_state() -> AppState {
        state_with(
            Arc::new(FixtureExtractor::with_delay(Duration::ZERO)),
            TrailingContent::Greedy,
        )
    }

    async fn post_json(app: Router, body: String) -> (StatusCode, Vec<u8>) {
        let request = Request::builder()
            .method("POST")
            .uri(ENDPOINT)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    async fn post_url(app: Router, url: &str) -> (StatusCode, Vec<u8>) {
        post_json(app, serde_json::json!({ "url": url }).to_string()).await
    }

    fn parse<T: DeserializeOwned>(bytes: &[u8]) -> T {
        serde_json::from_slice(bytes).unwrap()
    }

    struct FlakyExtractor {
        calls: AtomicUsize,
        failures: usize,
    }

    #[async_trait]
    impl ExtractionService for FlakyExtractor {
        async fn extract(&self, _: &ClassificationResult) -> Result<ExtractedRecord, ExtractError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                Err(ExtractError::ExtractionUnavailable("vision model unreachable".into()))
            } else {
                Ok(ExtractedRecord {
                    prescribed_test: vec!["LFT".into(), "LFT".into()],
                    ..ExtractedRecord::default()
                })
            }
        }
    }

    struct PanickingExtractor;

    #[async_trait]
    impl ExtractionService for PanickingExtractor {
        async fn extract(&self, _: &ClassificationResult) -> Result<ExtractedRecord, ExtractError> {
            panic!("decoder bug")
        }
    }

    #[tokio::test]
    async fn test_remote_reference_returns_full_response() {
        let (status, body) = post_url(router(fixture_state()), "http://example.com/scan.png").await;

        assert_eq!(status, StatusCode::OK);
        let response: ExtractionResponse = parse(&body);
        assert_eq!(response.extracted_data.patient_name, "Kumar");
        let inputs: Vec<_> = response
            .mapped_tests
            .iter()
            .map(|m| m.input_test_name.clone())
            .collect();
        assert_eq!(inputs, response.extracted_data.prescribed_test);
    }

    #[tokio::test]
    async fn test_missing_local_file_is_404_with_path() {
        let (status, body) =
            post_url(router(fixture_state()), "http://127.0.0.1/tmp/scan.png").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        let error: ErrorBody = parse(&body);
        assert!(error.detail.starts_with("File not found: tmp/scan.png"));
        assert!(error.detail.contains("/tmp/scan.png"));
    }

    #[tokio::test]
    async fn test_existing_local_file_with_port() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("img.jpg");
        std::fs::write(&file, b"jpg").unwrap();
        let url = format!("http://127.0.0.1:8080/{}", file.display());

        let state = fixture_state();
        let (status, _) = post_url(router(state.clone()), &url).await;

        assert_eq!(status, StatusCode::OK);
        let stats = state.metrics.snapshot();
        assert_eq!(stats.local_references, 1);
        assert_eq!(stats.successful_requests, 1);
    }

    #[tokio::test]
    async fn test_empty_url_is_400() {
        let (status, body) = post_url(router(fixture_state()), "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: ErrorBody = parse(&body);
        assert!(error.detail.contains("empty"));
    }

    #[tokio::test]
    async fn test_missing_url_field_is_400() {
        let (status, body) = post_json(router(fixture_state()), r#"{"link": "x"}"#.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: ErrorBody = parse(&body);
        assert!(!error.detail.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_loopback_is_400() {
        let (status, body) = post_url(router(fixture_state()), "http://127.0.0.1:port/scan.png").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: ErrorBody = parse(&body);
        assert!(error.detail.starts_with("Invalid local path URL format"));
    }

    #[tokio::test]
    async fn test_strict_policy_rejects_query() {
        let state = state_with(
            Arc::new(FixtureExtractor::with_delay(Duration::ZERO)),
            TrailingContent::Reject,
        );
        let (status, _) = post_url(router(state), "http://127.0.0.1/Cargo.toml?v=1").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_transient_extraction_failure_is_retried() {
        let extractor = Arc::new(FlakyExtractor {
            calls: AtomicUsize::new(0),
            failures: 1,
        });
        let (status, body) = post_url(
            router(state_with(extractor.clone(), TrailingContent::Greedy)),
            "http://example.com/scan.png",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 2);
        let response: ExtractionResponse = parse(&body);
        assert_eq!(response.mapped_tests.len(), 2);
        assert_eq!(response.mapped_tests[1].matched_test_code, "LFT001");
    }

    #[tokio::test]
    async fn test_non_image_file_fails_without_backoff() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.png");
        std::fs::write(&file, b"call the lab before noon").unwrap();

        // The model is never reached; the file is rejected before that.
        let vision = VisionExtractor::new(
            VisionClient::new("http://127.0.0.1:9".into(), "llava".into()),
            ImageLoader::default(),
            512 * 1024,
        );
        let state = AppState::new(
            RequestClassifier::default(),
            Pipeline::new(
                Arc::new(vision),
                Arc::new(CatalogMatcher::new(TestCatalog::default())),
            ),
            RetryPolicy::new(2, 500, 5000),
            Duration::from_secs(30),
            ExtractionMode::Vision,
        );

        let started = std::time::Instant::now();
        let (status, body) =
            post_url(router(state), &format!("http://127.0.0.1/{}", file.display())).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        // Two retries would sleep 500ms + 1000ms.
        assert!(started.elapsed() < Duration::from_millis(400));
        let error: ErrorBody = parse(&body);
        assert!(
            error
                .detail
                .starts_with("Error during processing: extraction failed: Unrecognised image data")
        );
    }

    #[tokio::test]
    async fn test_persistent_extraction_failure_is_500() {
        let extractor = Arc::new(FlakyExtractor {
            calls: AtomicUsize::new(0),
            failures: usize::MAX,
        });
        let state = state_with(extractor, TrailingContent::Greedy);
        let (status, body) = post_url(router(state.clone()), "http://example.com/scan.png").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let error: ErrorBody = parse(&body);
        assert_eq!(
            error.detail,
            "Error during processing: extraction service unavailable: vision model unreachable"
        );
        assert_eq!(state.metrics.snapshot().failed_requests, 1);
    }

    #[tokio::test]
    async fn test_panicking_collaborator_is_500() {
        let state = state_with(Arc::new(PanickingExtractor), TrailingContent::Greedy);
        let (status, body) = post_url(router(state), "http://example.com/scan.png").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let error: ErrorBody = parse(&body);
        assert!(error.detail.contains("extraction task failed"));
    }

    #[tokio::test]
    async fn test_slow_extraction_times_out() {
        let mut state = state_with(
            Arc::new(FixtureExtractor::with_delay(Duration::from_secs(60))),
            TrailingContent::Greedy,
        );
        state.request_timeout = Duration::from_millis(20);

        let (status, body) = post_url(router(state), "http://example.com/scan.png").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let error: ErrorBody = parse(&body);
        assert!(error.detail.contains("timed out"));
    }

    #[tokio::test]
    async fn test_health_and_stats() {
        let state = fixture_state();
        let app = router(state.clone());

        let response = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let health: HealthResponse = parse(&bytes);
        assert_eq!(health.status, "ok");
        assert_eq!(health.mode, ExtractionMode::Fixture);

        post_url(app.clone(), "http://127.0.0.1/tmp/rxmap-nope.png").await;
        let response = app
            .oneshot(Request::get("/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let stats: serde_json::Value = parse(&bytes);
        assert_eq!(stats["total_requests"], 1);
        assert_eq!(stats["failed_requests"], 1);
        assert_eq!(stats["local_not_found"], 1);
    }
}
