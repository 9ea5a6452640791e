use async_trait::async_trait;
use classify::ClassificationResult;

use crate::error::ExtractError;
use crate::schema::{ExtractedRecord, MappedTest};

/// Reads patient and prescription fields from a classified image reference.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    async fn extract(&self, reference: &ClassificationResult) -> Result<ExtractedRecord, ExtractError>;
}

/// Maps free-text test names onto catalog tests.
///
/// Implementations return exactly one entry per input name, in input order.
#[async_trait]
pub trait TestMatchingService: Send + Sync {
    async fn match_tests(&self, names: &[String]) -> Result<Vec<MappedTest>, ExtractError>;
}
