//! HTTP infrastructure adapter for the agent control API.
//!
//! Implements the [`agent::Transport`] trait over `reqwest`.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** URL building, the ACL token header, the datacenter
//! query parameter, timeouts and the mapping of HTTP failures onto
//! [`agent::TransportError`] all live here. The [`agent`] crate sees only
//! [`agent::Transport`].
//!
//! ## Timeouts
//!
//! `request_timeout` bounds each typed get/put from send to the last body
//! byte. The log stream has no natural end, so the streaming get is bounded
//! only by `connect_timeout`; it ends when the agent closes it or the caller
//! cancels.

mod config;

use std::time::Duration;

use agent::{ByteStream, Query, Transport, TransportError};
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use tokio_util::io::StreamReader;
use tracing::debug;

pub use config::{ConfigError, HttpConfig};

const TOKEN_HEADER: &str = "X-Consul-Token";

/// [`Transport`] implementation backed by a pooled `reqwest` client.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base: Url,
    token: Option<String>,
    datacenter: Option<String>,
    request_timeout: Duration,
}

impl HttpTransport {
    /// Builds the HTTP client described by `config`.
    pub fn new(config: HttpConfig) -> Result<Self, ConfigError> {
        let base = config.base_url()?;
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ConfigError::Client {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            base,
            token: config.token,
            datacenter: config.datacenter,
            request_timeout: config.request_timeout,
        })
    }

    /// Absolute URL for `path`, with `query` and the configured datacenter.
    ///
    /// `path` is resolved below the base URL, so a prefix such as
    /// `http://proxy/consul` is kept.
    fn url(&self, path: &str, query: &Query) -> Result<Url, TransportError> {
        let relative = path.trim_start_matches('/');
        let mut url = self
            .base
            .join(relative)
            .map_err(|e| TransportError::InvalidRequest {
                path: path.to_string(),
                message: e.to_string(),
            })?;

        let dc = self.datacenter.as_ref().map(|dc| ("dc", dc.as_str()));
        let pairs: Vec<(&str, &str)> = query
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .chain(dc)
            .collect();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        Ok(url)
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        query: &Query,
    ) -> Result<RequestBuilder, TransportError> {
        let url = self.url(path, query)?;
        debug!(%method, %url, "agent request");
        let mut builder = self.client.request(method, url);
        if let Some(token) = &self.token {
            builder = builder.header(TOKEN_HEADER, token);
        }
        Ok(builder)
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base", &self.base.as_str())
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("datacenter", &self.datacenter)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(
        &self,
        path: &str,
        query: &Query,
    ) -> Result<serde_json::Value, TransportError> {
        let response = self
            .request(Method::GET, path, query)?
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let response = check_status(response).await?;
        response.json().await.map_err(map_reqwest_error)
    }

    async fn put(
        &self,
        path: &str,
        query: &Query,
        body: Option<serde_json::Value>,
    ) -> Result<(), TransportError> {
        let mut builder = self
            .request(Method::PUT, path, query)?
            .timeout(self.request_timeout);
        if let Some(body) = &body {
            builder = builder.json(body);
        }
        let response = builder.send().await.map_err(map_reqwest_error)?;
        check_status(response).await?;
        Ok(())
    }

    async fn stream_get(&self, path: &str, query: &Query) -> Result<ByteStream, TransportError> {
        let response = self
            .request(Method::GET, path, query)?
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let response = check_status(response).await?;

        let chunks = response.bytes_stream().map_err(std::io::Error::other);
        Ok(Box::new(StreamReader::new(Box::pin(chunks))))
    }
}

/// Passes success responses through; turns anything else into
/// [`TransportError::Status`] carrying the body text.
async fn check_status(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after);
    let body = response.text().await.unwrap_or_default();
    Err(TransportError::Status {
        status: status.as_u16(),
        body: body.trim().to_string(),
        retry_after,
    })
}

/// `Retry-After` in its delay-seconds form. HTTP-date values are ignored.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_decode() {
        TransportError::Decode {
            message: err.to_string(),
        }
    } else if err.is_body() {
        TransportError::Body {
            message: err.to_string(),
        }
    } else {
        TransportError::Connect {
            message: err.to_string(),
        }
    }
}
