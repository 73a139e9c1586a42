use std::path::PathBuf;
use std::time::Duration;

use reqwest::StatusCode;

use crate::record::Field;
use crate::sites::Site;

/// Per-row failures. Caught at the row boundary, logged, and the row skipped.
#[derive(thiserror::Error, Debug)]
pub enum ScrapeError {
    #[error("unrecognized source: {url}")]
    UnrecognizedSource { url: String },
    #[error("{site}: could not retrieve {url}: {source}")]
    Retrieval {
        site: Site,
        url: String,
        #[source]
        source: RetrievalError,
    },
    #[error("{site}: page fetched but missing required field(s): {}", join_fields(.missing))]
    Validation { site: Site, missing: Vec<Field> },
}

impl ScrapeError {
    /// Short label used in log events.
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::UnrecognizedSource { .. } => "unrecognized_source",
            ScrapeError::Retrieval { .. } => "retrieval",
            ScrapeError::Validation { .. } => "validation",
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RetrievalError {
    #[error("unexpected status {status}")]
    HttpStatus { status: StatusCode },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("render failed: {0}")]
    Render(String),
    #[error("`{selector}` did not appear within {timeout:?}")]
    WaitTimeout { selector: String, timeout: Duration },
    #[error("navigation did not finish within {timeout:?}")]
    NavigateTimeout { timeout: Duration },
    #[error("rendering backend unavailable: {0}")]
    Unavailable(String),
}

impl RetrievalError {
    /// Rate limits, server errors, timeouts and connection failures are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            RetrievalError::HttpStatus { status } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            RetrievalError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            RetrievalError::Render(msg) => msg
                .split(|c: char| !c.is_ascii_alphanumeric())
                .filter_map(|token| token.parse::<u16>().ok())
                .any(|code| code == 429 || (500..600).contains(&code)),
            RetrievalError::WaitTimeout { .. } | RetrievalError::NavigateTimeout { .. } => true,
            RetrievalError::Unavailable(_) => false,
        }
    }
}

/// A field that survived extraction but cannot be coerced. Drops the row.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot normalize {field} value {value:?} for {url}")]
pub struct TransformError {
    pub field: Field,
    pub value: String,
    pub url: String,
}

/// Output failures. Fatal for the run.
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("{path} has header {found:?}, expected {expected:?}")]
    SchemaMismatch {
        path: PathBuf,
        found: String,
        expected: String,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum InputError {
    #[error("cannot open input {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{path} row {row}: {source}")]
    Row {
        path: PathBuf,
        row: u64,
        #[source]
        source: csv::Error,
    },
}

fn join_fields(fields: &[Field]) -> String {
    fields
        .iter()
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
