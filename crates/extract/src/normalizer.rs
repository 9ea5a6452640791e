use regex::Regex;
use std::sync::LazyLock;

static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[.,!?;:'"()\[\]]"#).expect("valid punctuation regex"));
static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s\-_/]+").expect("valid separator regex"));

/// Canonical lookup key for a test name: lowercase, punctuation removed,
/// dashes/underscores/slashes and whitespace runs collapsed to one space.
pub fn canonical_test_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    let stripped = PUNCTUATION.replace_all(&lowered, "");
    let collapsed = SEPARATORS.replace_all(&stripped, " ");
    collapsed.trim().to_string()
}
