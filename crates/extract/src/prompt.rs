pub fn build_extraction_prompt() -> String {
    r#"You are reading a doctor's prescription or lab requisition form from the attached image.
Extract the patient's details and the pathology lab tests that were prescribed.

INSTRUCTIONS:
1. Output ONLY valid JSON, nothing else
2. Use the exact keys in the schema below
3. Use "NA" for any value that is missing or unreadable
4. List every prescribed test exactly as written, in the order written

SCHEMA:
{
  "patient_title": "Mr|Mrs|Ms|Master|Baby|Dr",
  "patient_name": "name as written",
  "patient_name_reg": "name in the regional script, if any",
  "patient_age": 0,
  "patient_age_period": "Y|M|D",
  "patient_sex": "M|F|O",
  "patient_address": "address",
  "patient_contact": "phone number",
  "date": "YYYY-MM-DD",
  "ID": "patient or UHID number",
  "referrer_type": "D for doctor, H for hospital",
  "referrer_name": "referring doctor or hospital",
  "referrer_name_reg": "referrer in the regional script, if any",
  "prescribed_test": ["test name"],
  "remark": "any other notes"
}

JSON OUTPUT:"#
        .to_string()
}

pub fn build_retry_prompt(invalid_json: &str) -> String {
    format!(
        r#"The following JSON is invalid:

{}

Fix this JSON. Output only valid JSON with no markdown formatting, no code blocks, no explanations. Just the raw JSON object."#,
        invalid_json
    )
}
