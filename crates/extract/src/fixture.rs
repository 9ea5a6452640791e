use async_trait::async_trait;
use classify::ClassificationResult;
use std::time::Duration;
use tracing::info;

use crate::error::ExtractError;
use crate::schema::{Age, ExtractedRecord};
use crate::service::ExtractionService;

/// Stand-in extractor that answers every reference with the same record
/// after a fixed delay.
#[derive(Debug, Clone)]
pub struct FixtureExtractor {
    record: ExtractedRecord,
    delay: Duration,
}

impl FixtureExtractor {
    pub fn new(record: ExtractedRecord, delay: Duration) -> Self {
        Self { record, delay }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self::new(sample_record(), delay)
    }
}

#[async_trait]
impl ExtractionService for FixtureExtractor {
    async fn extract(&self, reference: &ClassificationResult) -> Result<ExtractedRecord, ExtractError> {
        info!(%reference, delay_ms = self.delay.as_millis() as u64, "serving fixture extraction");
        tokio::time::sleep(self.delay).await;
        Ok(self.record.clone())
    }
}

/// The canned prescription served in fixture mode.
pub fn sample_record() -> ExtractedRecord {
    ExtractedRecord {
        patient_title: "Mr".into(),
        patient_name: "Kumar".into(),
        patient_name_reg: "Kumar".into(),
        patient_age: Age::Number(serde_json::Number::from(62u32)),
        patient_age_period: "Y".into(),
        patient_sex: "M".into(),
        patient_address: "Chennai".into(),
        patient_contact: "948865128".into(),
        date: "2023-06-30".into(),
        id: "DA99".into(),
        referrer_type: "H".into(),
        referrer_name: "Arun Vijaya Hospitals Pvt. Ltd.".into(),
        referrer_name_reg: "NA".into(),
        prescribed_test: vec![
            "Complete Blood Count".into(),
            "LFT".into(),
            "HbA1c".into(),
        ],
        remark: "NA".into(),
        matched_ref_name: "Ram".into(),
        matched_ref_code: "0001".into(),
        matched_ref_type: "D".into(),
    }
}
