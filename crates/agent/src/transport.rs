//! The `Transport` port.
//!
//! Everything in this crate that talks to the agent does so through
//! [`Transport`]. URL building, authentication headers, connection pooling and
//! timeouts belong to the implementation (see the `transport-http` crate); the
//! domain sees only paths, query pairs and JSON values.

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::errors::TransportError;

/// An open, unbounded response body.
///
/// Dropping it closes the underlying connection.
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// Query-string pairs, in the order they should be sent.
pub type Query = Vec<(String, String)>;

/// Request dispatch against the agent's HTTP API.
///
/// Implementations must be shareable across tasks; a single instance backs
/// every clone of an [`crate::Agent`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// `GET path?query` and decode the body as JSON.
    async fn get_json(&self, path: &str, query: &Query)
        -> Result<serde_json::Value, TransportError>;

    /// `PUT path?query` with an optional JSON body; the response body is
    /// discarded.
    async fn put(
        &self,
        path: &str,
        query: &Query,
        body: Option<serde_json::Value>,
    ) -> Result<(), TransportError>;

    /// `GET path?query` and hand back the body without reading it.
    ///
    /// Returns once response headers have arrived; a non-success status is
    /// reported here rather than as stream content.
    async fn stream_get(&self, path: &str, query: &Query) -> Result<ByteStream, TransportError>;
}
