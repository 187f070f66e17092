use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when reading a session's settings file
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Settings file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Permission denied reading settings: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed settings in {path}: {source}")]
    MalformedSettings {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ParseError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::Io { path, source },
        }
    }
}

/// Reasons a title edit was refused
#[derive(Debug, Error)]
pub enum TitleUpdateError {
    #[error("No transcript found for session {session_id}")]
    SessionNotFound { session_id: String },

    #[error("Transcript is empty: {path}")]
    EmptyTranscript { path: PathBuf },

    #[error("First record of {path} is not valid JSON: {source}")]
    MalformedFirstLine {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("First record of {path} is not a session_start record")]
    NotSessionStart { path: PathBuf },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_kinds_are_classified() {
        let err = ParseError::io(
            "/tmp/a.settings.json",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(matches!(err, ParseError::NotFound { .. }));

        let err = ParseError::io(
            "/tmp/a.settings.json",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(err, ParseError::PermissionDenied { .. }));

        let err = ParseError::io("/tmp/a.settings.json", std::io::Error::other("disk on fire"));
        assert!(err.to_string().contains("disk on fire"));
    }
}
