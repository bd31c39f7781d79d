use std::path::PathBuf;

use thiserror::Error;

pub type ManifestResult<T> = Result<T, ManifestError>;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Path not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid manifest root: {}", .0.display())]
    InvalidRoot(PathBuf),

    #[error("External tool error: {0}")]
    ExternalTool(String),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Duplicate manifest path: {0}")]
    DuplicatePath(String),
}

impl ManifestError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Returns true when the error means the archive tool could not answer.
    pub fn is_external_tool(&self) -> bool {
        matches!(self, ManifestError::ExternalTool(_))
    }
}
