use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Outcome of classifying an image reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ClassificationResult {
    /// Opaque URL, handed to the fetcher untouched.
    Remote { url: String },
    /// Normalized path that existed at classification time.
    Local { path: PathBuf },
}

impl ClassificationResult {
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Remote { .. } => "remote",
            Self::Local { .. } => "local",
        }
    }
}

impl fmt::Display for ClassificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote { url } => write!(f, "remote {}", url),
            Self::Local { path } => write!(f, "local {}", path.display()),
        }
    }
}
