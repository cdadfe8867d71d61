use thiserror::Error;

pub type Result<T = (), E = SaveError> = std::result::Result<T, E>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SaveError {
    #[error("Invalid or unsafe path: {0}")]
    InvalidPath(String),

    #[error("Save not found: {0}")]
    NotFound(String),

    #[error("Invalid archive layout: {0}")]
    Structure(String),

    #[error("Save already exists: {0}")]
    Conflict(String),

    #[error("Failed to back up existing save: {0}")]
    Backup(String),

    #[error("Failed to decode save file: {0}")]
    Decode(String),

    #[error("Archive operation failed: {0}")]
    Archive(String),

    #[error("Filesystem error: {0}")]
    Io(String),

    #[error("None of the requested saves could be exported")]
    NoSuccess,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Failed to read or write repository state: {0}")]
    State(String),
}

impl SaveError {
    /// Wraps an I/O failure together with what was being attempted.
    pub fn io(context: impl std::fmt::Display, err: std::io::Error) -> Self {
        Self::Io(format!("{context}: {err}"))
    }

    /// Stable machine-readable tag, used by the JSON output.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidPath(_) => "invalid_path",
            Self::NotFound(_) => "not_found",
            Self::Structure(_) => "structure",
            Self::Conflict(_) => "conflict",
            Self::Backup(_) => "backup",
            Self::Decode(_) => "decode",
            Self::Archive(_) => "archive",
            Self::Io(_) => "io",
            Self::NoSuccess => "no_success",
            Self::InvalidRequest(_) => "invalid_request",
            Self::State(_) => "state",
        }
    }
}

impl From<std::io::Error> for SaveError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<zip::result::ZipError> for SaveError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Archive(err.to_string())
    }
}

impl From<walkdir::Error> for SaveError {
    fn from(err: walkdir::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<quick_xml::DeError> for SaveError {
    fn from(err: quick_xml::DeError) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<serde_json::Error> for SaveError {
    fn from(err: serde_json::Error) -> Self {
        Self::State(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags_are_stable() {
        assert_eq!(SaveError::NotFound("x".into()).kind(), "not_found");
        assert_eq!(SaveError::Conflict("Farm".into()).kind(), "conflict");
        assert_eq!(SaveError::NoSuccess.kind(), "no_success");
    }

    #[test]
    fn test_io_context_is_kept_in_message() {
        let err = SaveError::io(
            "remove /saves/Farm",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "Filesystem error: remove /saves/Farm: denied");
    }
}
