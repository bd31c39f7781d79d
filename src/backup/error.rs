use std::path::PathBuf;

use thiserror::Error;

use crate::manifest::ManifestError;

pub type BackupResult<T> = Result<T, BackupError>;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Script not found: {}", .0.display())]
    ScriptNotFound(PathBuf),

    #[error("Source path not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}")]
    ToolFailed { program: String, status: String },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),
}

impl BackupError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_not_found_error() {
        let err = BackupError::ScriptNotFound(PathBuf::from("/p/machine-scripts/init.sh"));
        assert_eq!(err.to_string(), "Script not found: /p/machine-scripts/init.sh");
    }

    #[test]
    fn test_tool_failed_error() {
        let err = BackupError::ToolFailed { program: "rsync".into(), status: "exit status: 23".into() };
        assert_eq!(err.to_string(), "rsync exited with exit status: 23");
    }

    #[test]
    fn test_manifest_error_conversion() {
        let err: BackupError = ManifestError::ExternalTool("bad listing".into()).into();
        assert_eq!(err.to_string(), "Manifest error: External tool error: bad listing");
    }
}
