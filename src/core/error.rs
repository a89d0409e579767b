use std::fmt;

/// Error taxonomy exposed at every public boundary of the core.
///
/// Every failure surfaces as a `(kind, message)` pair through the
/// operation's return channel; callers match on `kind` rather than parsing
/// `message`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Document field missing or wrong type under `reject`/`coerce-or-reject`.
    SchemaViolation,
    /// Collection, field, or id absent.
    NotFound,
    /// Duplicate collection name, duplicate field, kind-changing `alter`.
    Conflict,
    /// Filter grammar, unit, NaN, or polygon validity error.
    InvalidFilter,
    /// Query deadline reached before completion.
    DeadlineExceeded,
    /// An internal buffer could not grow further (e.g. posting list).
    ResourceExhausted,
    /// The KV store or an embedder RPC failed.
    BackendFailure,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: impl Into<String>) -> Self {
        Error { kind, context: context.into() }
    }

    pub fn not_found(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::NotFound, context)
    }

    pub fn conflict(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Conflict, context)
    }

    pub fn schema_violation(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::SchemaViolation, context)
    }

    pub fn invalid_filter(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidFilter, context)
    }

    /// Error message format used throughout the filter evaluator:
    /// `Value of filter field <f>: <reason>`.
    pub fn invalid_filter_field(field: &str, reason: impl fmt::Display) -> Self {
        Error::invalid_filter(format!("Value of filter field {}: {}", field, reason))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.context)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::new(ErrorKind::BackendFailure, err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::new(ErrorKind::BackendFailure, err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
