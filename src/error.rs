//! Custom error types and result handling for Gappei operations.
//!
//! Most merge failures are reported as data inside [`MergeResult`](crate::types::MergeResult).
//! This type covers everything that travels through `?` on the way there, and the few
//! conditions that are returned directly (such as failing to create scratch space).
//!
use std::path::PathBuf;

/// Type alias for Results with Gappei errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all Gappei operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O errors from the standard library
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// ZIP file operation errors
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    /// Blocking task join errors
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
    /// Configuration builder errors, such as a missing output path
    #[error(transparent)]
    GappeiBuilder(#[from] crate::merger::GappeiConfigBuilderError),
    /// Error for invalid file or directory paths
    #[error("The given path '{0:?}' is invalid: {1}")]
    InvalidPath(PathBuf, String),
    /// The file is not an archive this crate can merge
    #[error("Invalid archive '{0:?}': {1}")]
    InvalidArchive(PathBuf, String),
    /// The archive holds no image matching the requested formats
    #[error("No images found in '{0:?}' for formats: {1}")]
    NoImages(PathBuf, String),
    /// Error for unsupported operations or formats (e.g., unknown image extension)
    #[error("Unsupported: {0}")]
    Unsupported(String),
    /// Error for resources that couldn't be found
    #[error("Not found: {0}")]
    NotFound(String),
    /// Other errors that don't fit into specific categories
    #[error("Other error: {0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(error: String) -> Self {
        Error::Other(error)
    }
}

impl From<&str> for Error {
    fn from(error: &str) -> Self {
        Error::Other(error.to_string())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}
