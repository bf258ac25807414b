use std::path::PathBuf;

use thiserror::Error;

/// Startup failures. Always fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read configuration {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("missing required setting `{0}`")]
    Missing(&'static str),
    #[error("data directory '{0}' not found or invalid")]
    DataDirectory(PathBuf),
}

/// Failures talking to the Stash GraphQL endpoint. Fatal to a sync run.
#[derive(Error, Debug)]
pub enum StashError {
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("network: {0}")]
    Net(#[from] reqwest::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("graphql errors in {op}: {messages}")]
    GraphQl { op: &'static str, messages: String },
    #[error("invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),
}

/// Anything that aborts a sync run.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Stash(#[from] StashError),
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("failed to encode backup record: {0}")]
    Encode(#[from] serde_json::Error),
}

impl SyncError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Io {
            path: path.into(),
            source,
        }
    }
}
