//! Error taxonomy for deck synchronization.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while synchronizing deck artifacts.
///
/// Every variant maps to one severity class via [`Error::severity`]:
/// schema and structural problems abort the affected run or unit outright,
/// and drift and dangling references skip the affected unit with a report.
/// `Ambiguity` only exists in strict mode (default mode resolves to the
/// first match and returns warning strings instead), so it aborts too.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to read or write a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or missing required structure in a tabular or patch file.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A recomputed fingerprint disagrees with the recorded one.
    #[error("Content drift: {0}")]
    Drift(String),

    /// A locator, document, or shape could not be found.
    #[error("Reference not found: {0}")]
    Reference(String),

    /// More than one equally valid resolution exists.
    #[error("Ambiguous resolution: {0}")]
    Ambiguity(String),

    /// A resolved template structure lacks a required placeholder role.
    #[error("Structural error: {0}")]
    Structural(String),

    /// Tabular file parse or write error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Patch file parse or write error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// How severe an error is for the run that hit it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Recorded, run continues unchanged.
    Warning,
    /// Recorded, the affected unit is skipped.
    Error,
    /// The entire run aborts.
    Fatal,
}

impl Error {
    /// Map this error to its severity class.
    pub fn severity(&self) -> Severity {
        match self {
            Error::Drift(_) | Error::Reference(_) => Severity::Error,
            Error::Schema(_)
            | Error::Structural(_)
            | Error::Ambiguity(_)
            | Error::Io(_)
            | Error::Csv(_)
            | Error::Yaml(_) => Severity::Fatal,
        }
    }
}
