use serde::{Deserialize, Serialize};

/// Sentinel for fields the extractor could not read.
pub const NOT_AVAILABLE: &str = "NA";

fn not_available() -> String {
    NOT_AVAILABLE.to_string()
}

/// Patient age as written on the form: usually a number, sometimes free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Age {
    Number(serde_json::Number),
    Text(String),
}

impl Default for Age {
    fn default() -> Self {
        Age::Text(not_available())
    }
}

/// Fields read off a prescription image. Every key is always present in the
/// payload; unreadable values carry [`NOT_AVAILABLE`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    #[serde(default = "not_available")]
    pub patient_title: String,
    #[serde(default = "not_available")]
    pub patient_name: String,
    #[serde(default = "not_available")]
    pub patient_name_reg: String,
    #[serde(default)]
    pub patient_age: Age,
    #[serde(default = "not_available")]
    pub patient_age_period: String,
    #[serde(default = "not_available")]
    pub patient_sex: String,
    #[serde(default = "not_available")]
    pub patient_address: String,
    #[serde(default = "not_available")]
    pub patient_contact: String,
    #[serde(default = "not_available")]
    pub date: String,
    #[serde(rename = "ID", default = "not_available")]
    pub id: String,
    #[serde(default = "not_available")]
    pub referrer_type: String,
    #[serde(default = "not_available")]
    pub referrer_name: String,
    #[serde(default = "not_available")]
    pub referrer_name_reg: String,
    #[serde(default)]
    pub prescribed_test: Vec<String>,
    #[serde(default = "not_available")]
    pub remark: String,
    #[serde(default = "not_available")]
    pub matched_ref_name: String,
    #[serde(default = "not_available")]
    pub matched_ref_code: String,
    #[serde(default = "not_available")]
    pub matched_ref_type: String,
}

impl Default for ExtractedRecord {
    fn default() -> Self {
        Self {
            patient_title: not_available(),
            patient_name: not_available(),
            patient_name_reg: not_available(),
            patient_age: Age::default(),
            patient_age_period: not_available(),
            patient_sex: not_available(),
            patient_address: not_available(),
            patient_contact: not_available(),
            date: not_available(),
            id: not_available(),
            referrer_type: not_available(),
            referrer_name: not_available(),
            referrer_name_reg: not_available(),
            prescribed_test: Vec::new(),
            remark: not_available(),
            matched_ref_name: not_available(),
            matched_ref_code: not_available(),
            matched_ref_type: not_available(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedTest {
    pub input_test_name: String,
    pub matched_test_name: String,
    pub matched_test_code: String,
}

impl MappedTest {
    pub fn unmatched(input_test_name: &str) -> Self {
        Self {
            input_test_name: input_test_name.to_string(),
            matched_test_name: not_available(),
            matched_test_code: not_available(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResponse {
    pub extracted_data: ExtractedRecord,
    pub mapped_tests: Vec<MappedTest>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_fields_become_sentinel() {
        let record: ExtractedRecord =
            serde_json::from_str(r#"{"patient_name": "Kumar", "patient_age": 62}"#).unwrap();

        assert_eq!(record.patient_name, "Kumar");
        assert_eq!(record.patient_age, Age::Number(serde_json::Number::from(62u32)));
        assert_eq!(record.id, NOT_AVAILABLE);
        assert_eq!(record.remark, NOT_AVAILABLE);
        assert!(record.prescribed_test.is_empty());
    }

    #[test]
    fn test_wire_keys() {
        let record = ExtractedRecord {
            id: "DA99".into(),
            ..ExtractedRecord::default()
        };
        let value = serde_json::to_value(&record).unwrap();
        let object = value.as_object().unwrap();

        assert_eq!(object["ID"], "DA99");
        assert_eq!(object["patient_age"], "NA");
        assert_eq!(object.len(), 18);
        assert!(object.contains_key("prescribed_test"));
        assert!(object.contains_key("matched_ref_type"));
    }

    #[test]
    fn test_text_age() {
        let record: ExtractedRecord =
            serde_json::from_str(r#"{"patient_age": "6 months"}"#).unwrap();
        assert_eq!(record.patient_age, Age::Text("6 months".into()));
    }
}
