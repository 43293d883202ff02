use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported file format '{0}': use JPG, PNG, or PDF")]
    UnsupportedFormat(String),

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("failed to rasterize PDF page {page}: {reason}")]
    Rasterize { page: usize, reason: String },

    #[error("analysis failed: {0}")]
    Analysis(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("font error in {path}: {reason}")]
    Font { path: PathBuf, reason: String },
}

impl Error {
    /// True for failures caused by the uploaded input rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::UnsupportedFormat(_) | Error::InvalidImage(_))
    }
}
