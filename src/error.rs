use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ImfError {
    #[error("invalid version: {0}")]
    #[diagnostic(help("versions are a release month (April or October) and a year, or \"latest\""))]
    InvalidVersion(String),

    #[error("unexpected archive contents: {0}")]
    UnexpectedFile(String),

    #[error("malformed archive: {0}")]
    MalformedArchive(String),

    #[error("no data found: {0}")]
    NoData(String),

    #[error("request failed: {0}")]
    Http(String),

    #[error("{url} returned status {status}")]
    HttpStatus { status: u16, url: String },

    #[error("unable to read page: {0}")]
    Html(String),

    #[error("unexpected response from {url}: {reason}")]
    InvalidResponse { url: String, reason: String },

    #[error("unable to read delimited export: {0}")]
    Delimited(String),

    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("unit basis must be either 'SDR' or 'USD', got {0}")]
    InvalidUnitBasis(String),

    #[error("missing required column: {0}")]
    MissingColumn(String),

    #[error("table shape mismatch: {0}")]
    TableShape(String),

    #[error("cache error: {0}")]
    CacheIo(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),
}

impl ImfError {
    pub fn is_transport(&self) -> bool {
        matches!(self, ImfError::Http(_) | ImfError::HttpStatus { .. })
    }
}
