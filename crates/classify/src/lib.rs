//! Classification of caller-supplied image references.
//!
//! A reference is either an opaque remote URL or a local filesystem path
//! smuggled inside a loopback-host URL (`http://127.0.0.1[:port]/<path>`).
//! Local references are normalized and checked for existence before anything
//! downstream gets to see them.

pub mod classifier;
pub mod error;
pub mod normalize;
pub mod reference;

pub use classifier::{RequestClassifier, TrailingContent};
pub use error::{ClassifyError, Result};
pub use normalize::normalize_path;
pub use reference::ClassificationResult;

/// Classify with the default (greedy) trailing-content policy.
pub fn classify(reference: &str) -> Result<ClassificationResult> {
    RequestClassifier::default().classify(reference)
}
