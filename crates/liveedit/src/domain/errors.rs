//! Domain-specific errors.

use std::path::PathBuf;

use thiserror::Error;

/// Malformed location identifier on the wire.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("invalid identifier '{0}': expected path:line:column")]
    MissingParts(String),
    #[error("invalid identifier '{identifier}': {field} is not a number")]
    NotNumeric {
        identifier: String,
        field: &'static str,
    },
    #[error("invalid identifier '{identifier}': {field} must be 1-based")]
    ZeroCoordinate {
        identifier: String,
        field: &'static str,
    },
    #[error("invalid identifier '{0}': empty path")]
    EmptyPath(String),
}

/// Failure categories of one patch request.
///
/// Every variant leaves the target file untouched.
#[derive(Debug, Error)]
pub enum PatchError {
    #[error(transparent)]
    InvalidIdentifier(#[from] IdentifierError),
    #[error("access denied: {path}: {reason}")]
    AccessDenied { path: String, reason: &'static str },
    #[error("file not found: {}", path.display())]
    NotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no element at {identifier}; the file may have changed since it was stamped")]
    TargetNotFound { identifier: String },
    #[error("element at {identifier} has no text content to replace")]
    NotMutable { identifier: String },
    #[error("failed to parse {path}")]
    ParseFailure { path: String },
    #[error("failed to write {}", path.display())]
    InternalFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PatchError {
    /// Stable name of the failure category.
    pub fn kind(&self) -> &'static str {
        match self {
            PatchError::InvalidIdentifier(_) => "InvalidIdentifier",
            PatchError::AccessDenied { .. } => "AccessDenied",
            PatchError::NotFound { .. } => "NotFound",
            PatchError::TargetNotFound { .. } => "TargetNotFound",
            PatchError::NotMutable { .. } => "NotMutable",
            PatchError::ParseFailure { .. } => "ParseFailure",
            PatchError::InternalFailure { .. } => "InternalFailure",
        }
    }
}

/// Syntax tree construction failed outright.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("grammar could not be loaded: {0}")]
    Language(String),
    #[error("parser produced no tree")]
    NoTree,
}
