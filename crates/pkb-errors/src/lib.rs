//! Shared error taxonomy for the retrieval engine.
//!
//! Every fallible operation across the workspace resolves to a [`PkbError`],
//! classified by [`PkbError::kind`] for callers that branch on failure mode
//! and [`PkbError::code`] for the machine-readable code surfaced over both
//! tool transports.

use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum PkbError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("embedding provider error: {0}")]
    Provider(String),

    #[error("failed to load local embedding model: {0}")]
    ModelLoad(String),

    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("store error: {0}")]
    Store(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("path escapes the space root")]
    PathTraversal,

    #[error("proposals library is not installed")]
    LibraryNotInstalled,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("operation timed out")]
    Timeout,

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PkbErrorKind {
    Config,
    Provider,
    ModelLoad,
    Parse,
    Store,
    InvalidQuery,
    PathTraversal,
    LibraryNotInstalled,
    NotFound,
    Timeout,
    Internal,
}

impl fmt::Display for PkbErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl PkbError {
    pub fn kind(&self) -> PkbErrorKind {
        match self {
            PkbError::Config(_) => PkbErrorKind::Config,
            PkbError::Provider(_) => PkbErrorKind::Provider,
            PkbError::ModelLoad(_) => PkbErrorKind::ModelLoad,
            PkbError::Parse { .. } => PkbErrorKind::Parse,
            PkbError::Store(_) => PkbErrorKind::Store,
            PkbError::InvalidQuery(_) => PkbErrorKind::InvalidQuery,
            PkbError::PathTraversal => PkbErrorKind::PathTraversal,
            PkbError::LibraryNotInstalled => PkbErrorKind::LibraryNotInstalled,
            PkbError::NotFound(_) => PkbErrorKind::NotFound,
            PkbError::Timeout => PkbErrorKind::Timeout,
            PkbError::Internal(_) => PkbErrorKind::Internal,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            PkbError::Config(_) => "CONFIG_ERROR",
            PkbError::Provider(_) => "PROVIDER_ERROR",
            PkbError::ModelLoad(_) => "MODEL_LOAD_ERROR",
            PkbError::Parse { .. } => "PARSE_ERROR",
            PkbError::Store(_) => "STORE_ERROR",
            PkbError::InvalidQuery(_) => "INVALID_QUERY",
            PkbError::PathTraversal => "PATH_TRAVERSAL",
            PkbError::LibraryNotInstalled => "LIBRARY_NOT_INSTALLED",
            PkbError::NotFound(_) => "NOT_FOUND",
            PkbError::Timeout => "TIMEOUT",
            PkbError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<rusqlite::Error> for PkbError {
    fn from(err: rusqlite::Error) -> Self {
        PkbError::Store(err.to_string())
    }
}

pub type PkbResult<T> = Result<T, PkbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_path_traversal_when_classified_then_code_is_stable() {
        let err = PkbError::PathTraversal;
        assert_eq!(err.kind(), PkbErrorKind::PathTraversal);
        assert_eq!(err.code(), "PATH_TRAVERSAL");
        assert_eq!(err.to_string(), "path escapes the space root");
    }

    #[test]
    fn given_internal_anyhow_error_when_wrapped_then_kind_is_internal() {
        let anyhow_err = anyhow::anyhow!("boom");
        let err: PkbError = anyhow_err.into();
        assert_eq!(err.kind(), PkbErrorKind::Internal);
    }
}
