use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{ClassifyError, Result};
use crate::normalize::normalize_path;
use crate::reference::ClassificationResult;

const LOOPBACK_PREFIX: &str = "http://127.0.0.1";

/// What to do with `?query` / `#fragment` text after a local path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrailingContent {
    /// Everything up to end-of-string belongs to the path.
    #[default]
    Greedy,
    /// Query strings and fragments make the reference malformed.
    Reject,
}

/// Stateless classifier; cheap to copy into every request handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestClassifier {
    trailing: TrailingContent,
}

impl RequestClassifier {
    pub fn new(trailing: TrailingContent) -> Self {
        Self { trailing }
    }

    /// Decide whether `reference` is a loopback-encoded local path or an
    /// opaque remote URL. Local paths are normalized and must exist.
    pub fn classify(&self, reference: &str) -> Result<ClassificationResult> {
        if reference.is_empty() {
            return Err(ClassifyError::InvalidReference(
                "image reference cannot be empty".into(),
            ));
        }

        let Some(segment) = self.local_segment(reference)? else {
            debug!(reference, "processing an external URL");
            return Ok(ClassificationResult::Remote {
                url: reference.to_string(),
            });
        };

        let path = normalize_path(Path::new(segment));
        if !path.exists() {
            warn!(path = %path.display(), "file not found at local path");
            return Err(ClassifyError::LocalPathNotFound {
                path,
                reference: reference.to_string(),
            });
        }

        debug!(path = %path.display(), "interpreted local file path");
        Ok(ClassificationResult::Local { path })
    }

    /// Captured path segment for loopback references, `None` for anything
    /// whose authority is not exactly the loopback host.
    fn local_segment<'a>(&self, reference: &'a str) -> Result<Option<&'a str>> {
        let Some(rest) = reference.strip_prefix(LOOPBACK_PREFIX) else {
            return Ok(None);
        };

        let path = match rest.chars().next() {
            Some('/') => &rest[1..],
            Some(':') => {
                let port_and_path = &rest[1..];
                let port_end = port_and_path
                    .find(['/', '?', '#'])
                    .unwrap_or(port_and_path.len());
                let port = &port_and_path[..port_end];
                if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(malformed(reference, format!("invalid port {:?}", port)));
                }
                match port_and_path[port_end..].strip_prefix('/') {
                    Some(path) => path,
                    None => return Err(malformed(reference, "missing path after host")),
                }
            }
            None | Some('?') | Some('#') => {
                return Err(malformed(reference, "missing path after host"));
            }
            // 127.0.0.10, 127.0.0.1.nip.io, 127.0.0.1@host...
            Some(_) => return Ok(None),
        };

        let segment = strip_quotes(path);
        if self.trailing == TrailingContent::Reject && segment.contains(['?', '#']) {
            return Err(malformed(reference, "query or fragment after local path"));
        }

        Ok(Some(segment))
    }
}

fn strip_quotes(segment: &str) -> &str {
    let segment = segment.strip_prefix(['\'', '"']).unwrap_or(segment);
    segment.strip_suffix(['\'', '"']).unwrap_or(segment)
}

fn malformed(reference: &str, reason: impl Into<String>) -> ClassifyError {
    ClassifyError::MalformedLocalUrl {
        reference: reference.to_string(),
        reason: reason.into(),
    }
}
