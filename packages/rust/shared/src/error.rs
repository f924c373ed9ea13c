//! Error types for quizbank.
//!
//! Library crates use [`QuizbankError`] via `thiserror`.
//! The server binary wraps this with `color-eyre` for startup diagnostics and
//! maps [`ErrorKind`] onto HTTP status codes for request failures.

use std::path::PathBuf;

/// Top-level error type for all quizbank operations.
#[derive(Debug, thiserror::Error)]
pub enum QuizbankError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Caller supplied something we cannot work with (wrong file type,
    /// mismatched form lists, empty credentials).
    #[error("{message}")]
    InvalidInput { message: String },

    /// The archive could not be read or unpacked.
    #[error("invalid archive {name}: {message}")]
    Archive { name: String, message: String },

    /// The unpacked archive holds no question document.
    #[error("No HTML file found in the ZIP archive: {archive}.")]
    DocumentNotFound { archive: String },

    /// A document references an image that is not in the archive.
    #[error("Image file not found: {src}")]
    ImageNotFound { src: String },

    /// Registration with a username that already exists.
    #[error("Username already registered")]
    DuplicateUsername,

    /// Unknown user or wrong password. Deliberately indistinguishable.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Missing, malformed, or expired bearer token, or a token for a user
    /// that no longer exists.
    #[error("Invalid authentication credentials")]
    Unauthorized,

    /// Remote object storage rejected an upload or has no credentials.
    #[error("object storage error: {0}")]
    ObjectStorage(String),

    /// Database or persistence layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Unexpected failure with no better home (a panicked blocking task,
    /// token encoding).
    #[error("internal error: {0}")]
    Internal(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, QuizbankError>;

/// Coarse classification used to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 4xx, the caller can fix the request.
    ClientInput,
    /// 401.
    Unauthorized,
    /// 5xx from object storage.
    Storage,
    /// 5xx from the database, transaction already rolled back.
    Persistence,
    /// 5xx, anything else.
    Internal,
}

impl QuizbankError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an input error from any displayable message.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    /// Create an archive error for the named upload.
    pub fn archive(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Archive {
            name: name.into(),
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Which bucket of the error taxonomy this error falls into.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput { .. }
            | Self::Archive { .. }
            | Self::DocumentNotFound { .. }
            | Self::ImageNotFound { .. }
            | Self::DuplicateUsername
            | Self::InvalidCredentials => ErrorKind::ClientInput,
            Self::Unauthorized => ErrorKind::Unauthorized,
            Self::ObjectStorage(_) => ErrorKind::Storage,
            Self::Storage(_) => ErrorKind::Persistence,
            Self::Config { .. } | Self::Internal(_) | Self::Io { .. } => ErrorKind::Internal,
        }
    }
}
