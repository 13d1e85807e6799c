//! Error types for the feed client

use thiserror::Error;

/// Failures raised by a [`Transport`](crate::transport::Transport).
///
/// These are handed back to the caller untouched; the client never retries
/// or rewrites them.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid server url: {0}")]
    Url(#[from] url::ParseError),

    #[error("http request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{method} {path} returned {status}: {body}")]
    Status {
        method: &'static str,
        path: String,
        status: u16,
        body: String,
    },
}

/// Errors raised by records and the feed client
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("invalid feed info: {0}")]
    InvalidFeedInfo(String),

    #[error("invalid report: {0}")]
    InvalidReport(String),

    #[error("invalid ioc: {0}")]
    InvalidIoc(String),

    #[error("invalid query ioc: {0}")]
    InvalidQueryIoc(String),

    #[error("invalid feed: {0}")]
    InvalidFeed(String),

    #[error("unsupported type for attribute {field}: {type_name}")]
    UnsupportedFieldType { field: String, type_name: String },

    #[error("validate() not implemented for {0}")]
    ValidationNotImplemented(&'static str),

    #[error("{record} failed validation: {reason}")]
    Validation { record: &'static str, reason: String },

    #[error("bad type for feed deletion: {0}")]
    BadIdentifierType(String),

    #[error("{0:?} is not a usable id")]
    InvalidId(String),

    #[error("{0} has no id")]
    MissingId(&'static str),

    #[error("{0} is not bound to a live client")]
    Detached(&'static str),

    #[error("unexpected response from {path}: {reason}")]
    UnexpectedResponse { path: String, reason: String },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub type Result<T> = std::result::Result<T, FeedError>;
