//! Transport capability consumed by the feed client

pub mod http;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;

pub use http::HttpTransport;

/// Raw JSON request/response access to the feed manager API.
///
/// Implementations own the connection, authentication and any retry policy.
/// Each call is a single request; errors are returned as-is.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Server the transport talks to, for diagnostics
    fn server(&self) -> String;

    /// GET `path` with the given query parameters
    async fn get_object(&self, path: &str, query: &[(String, String)]) -> Result<Value, TransportError>;

    /// POST a JSON body to `path`
    async fn post_object(&self, path: &str, body: &Value) -> Result<Value, TransportError>;

    /// PUT a JSON body to `path`
    async fn put_object(&self, path: &str, body: &Value) -> Result<Value, TransportError>;

    /// DELETE `path`
    async fn delete_object(&self, path: &str) -> Result<(), TransportError>;
}
