use thiserror::Error;

/// Failures reported by the extraction and matching collaborators.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The input or the model's answer can't be used; another attempt would
    /// fail the same way.
    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    /// The model server or image host could not be reached, timed out, or
    /// answered with a 5xx.
    #[error("extraction service unavailable: {0}")]
    ExtractionUnavailable(String),

    #[error("test matching failed: {0}")]
    MatchingFailed(String),
}

impl ExtractError {
    /// Flatten an `anyhow` chain into an extraction failure, keeping
    /// transport-level failures apart so they can be retried.
    pub fn extraction(err: anyhow::Error) -> Self {
        let reason = format!("{:#}", err);
        if is_transient(&err) {
            ExtractError::ExtractionUnavailable(reason)
        } else {
            ExtractError::ExtractionFailed(reason)
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ExtractError::ExtractionUnavailable(_))
    }
}

fn is_transient(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<reqwest::Error>())
        .any(|e| {
            e.is_connect()
                || e.is_timeout()
                || e.status().is_some_and(|status| status.is_server_error())
        })
}
