use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifyError {
    /// The reference fails basic shape requirements.
    #[error("invalid image reference: {0}")]
    InvalidReference(String),

    /// A loopback reference whose normalized path does not exist.
    #[error("File not found: {} (referenced by {reference})", .path.display())]
    LocalPathNotFound { path: PathBuf, reference: String },

    /// The host is the loopback address but the rest of the URL does not parse.
    #[error("Invalid local path URL format: {reason}")]
    MalformedLocalUrl { reference: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ClassifyError>;
