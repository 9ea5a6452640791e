use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use classify::ClassifyError;
use extract::ExtractError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, warn};

/// Everything a request can fail with, one variant per status class.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidReference(String),

    #[error("File not found: {} (referenced by {reference})", .path.display())]
    LocalPathNotFound { path: PathBuf, reference: String },

    #[error("Invalid local path URL format: {0}")]
    MalformedLocalUrl(String),

    #[error("Error during processing: {0}")]
    UpstreamFailure(#[from] ExtractError),

    #[error("Error during processing: {0:#}")]
    UnexpectedFailure(#[from] anyhow::Error),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidReference(_) | ApiError::MalformedLocalUrl(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::LocalPathNotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::UpstreamFailure(_) | ApiError::UnexpectedFailure(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Call inside the request span so the entry carries the request id.
    pub fn log(&self) {
        match self {
            // Debug on anyhow prints the whole cause chain and backtrace.
            ApiError::UnexpectedFailure(err) => error!(error = ?err, "unexpected failure during processing"),
            ApiError::UpstreamFailure(err) => error!(error = %err, "upstream collaborator failed"),
            other => warn!(status = other.status().as_u16(), error = %other, "request rejected"),
        }
    }
}

impl From<ClassifyError> for ApiError {
    fn from(err: ClassifyError) -> Self {
        match err {
            ClassifyError::InvalidReference(_) => ApiError::InvalidReference(err.to_string()),
            ClassifyError::LocalPathNotFound { path, reference } => {
                ApiError::LocalPathNotFound { path, reference }
            }
            ClassifyError::MalformedLocalUrl { reason, .. } => ApiError::MalformedLocalUrl(reason),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            detail: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_errors_map_to_status() {
        let cases = [
            (ClassifyError::InvalidReference("empty".into()), StatusCode::BAD_REQUEST),
            (
                ClassifyError::LocalPathNotFound {
                    path: PathBuf::from("tmp/scan.png"),
                    reference: "http://127.0.0.1/tmp/scan.png".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                ClassifyError::MalformedLocalUrl {
                    reference: "http://127.0.0.1".into(),
                    reason: "missing path after host".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_upstream_detail_includes_cause() {
        let err = ApiError::from(ExtractError::MatchingFailed("catalog unavailable".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            err.to_string(),
            "Error during processing: test matching failed: catalog unavailable"
        );
    }

    #[test]
    fn test_unexpected_detail_includes_chain() {
        let err = ApiError::from(anyhow::anyhow!("disk full").context("writing scratch file"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            err.to_string(),
            "Error during processing: writing scratch file: disk full"
        );
    }
}
