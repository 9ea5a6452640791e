pub mod catalog;
pub mod error;
pub mod fixture;
pub mod llm;
pub mod normalizer;
pub mod prepare;
pub mod prompt;
pub mod schema;
pub mod service;
pub mod source;
pub mod vision;

#[cfg(test)]
mod test_server;

pub use catalog::{CatalogEntry, CatalogMatcher, TestCatalog};
pub use error::ExtractError;
pub use fixture::FixtureExtractor;
pub use llm::VisionClient;
pub use schema::{Age, ExtractedRecord, ExtractionResponse, MappedTest, NOT_AVAILABLE};
pub use service::{ExtractionService, TestMatchingService};
pub use source::{DOWNLOAD_LIMIT_FACTOR, ImageLoader};
pub use vision::VisionExtractor;

use classify::ClassificationResult;
use std::sync::Arc;
use tracing::info;

/// Runs extraction, then maps the prescribed tests. Either the whole
/// response comes back or an error does.
#[derive(Clone)]
pub struct Pipeline {
    extraction: Arc<dyn ExtractionService>,
    matching: Arc<dyn TestMatchingService>,
}

impl Pipeline {
    pub fn new(
        extraction: Arc<dyn ExtractionService>,
        matching: Arc<dyn TestMatchingService>,
    ) -> Self {
        Self {
            extraction,
            matching,
        }
    }

    pub async fn run(&self, reference: &ClassificationResult) -> Result<ExtractionResponse, ExtractError> {
        let extracted_data = self.extraction.extract(reference).await?;
        let names = &extracted_data.prescribed_test;
        info!(tests = names.len(), "extraction complete, mapping tests");

        let mapped_tests = self.matching.match_tests(names).await?;
        check_alignment(names, &mapped_tests)?;

        Ok(ExtractionResponse {
            extracted_data,
            mapped_tests,
        })
    }
}

/// One mapped entry per input name, same order.
fn check_alignment(names: &[String], mapped: &[MappedTest]) -> Result<(), ExtractError> {
    if names.len() != mapped.len() {
        return Err(ExtractError::MatchingFailed(format!(
            "matcher returned {} entries for {} test names",
            mapped.len(),
            names.len()
        )));
    }

    if let Some((i, (name, entry))) = names
        .iter()
        .zip(mapped)
        .enumerate()
        .find(|(_, (name, entry))| **name != entry.input_test_name)
    {
        return Err(ExtractError::MatchingFailed(format!(
            "entry {} maps {:?} but input was {:?}",
            i, entry.input_test_name, name
        )));
    }

    Ok(())
}
