use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure reported by a browser engine while executing one command.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("browser command failed: {0}")]
    Command(String),

    #[error("no element matches `{0}`")]
    NotFound(String),

    #[error("{engine} engine does not support {operation}")]
    Unsupported {
        engine: &'static str,
        operation: &'static str,
    },

    #[error("fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("decode script result: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A structurally required field could not be read from one shelf row.
#[derive(Debug, Error, PartialEq)]
pub enum ExtractError {
    #[error("required field `{field}` not found (selector `{selector}`)")]
    MissingField {
        field: &'static str,
        selector: &'static str,
    },

    #[error("field `{field}` is not a number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("not a Goodreads profile or shelf url: {0}")]
    InvalidUrl(String),

    #[error("login failed: still on the sign-in page ({0})")]
    LoginFailed(String),

    #[error("login required but no credentials configured")]
    MissingCredentials,

    #[error("timed out after {waited:?} waiting for {what}")]
    Timeout { what: &'static str, waited: Duration },

    #[error("malformed load status text: {0:?}")]
    MalformedStatus(String),

    #[error("malformed pagination control: {0:?}")]
    MalformedPagination(Vec<String>),

    #[error("book #{index}: {source}")]
    Extract {
        index: usize,
        #[source]
        source: ExtractError,
    },

    #[error("session file {}: {message}", path.display())]
    Session { path: PathBuf, message: String },

    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl ScrapeError {
    pub(crate) fn timeout(what: &'static str, waited: Duration) -> Self {
        Self::Timeout { what, waited }
    }
}
