//! Connection settings for [`crate::HttpTransport`].

use std::time::Duration;

use reqwest::Url;
use thiserror::Error;

/// Default agent address when `CONSUL_HTTP_ADDR` is unset.
pub const DEFAULT_ADDRESS: &str = "http://127.0.0.1:8500";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors detected while building an [`crate::HttpTransport`].
///
/// Produced at construction; a transport never exists with an invalid config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The agent address is not an `http` or `https` URL.
    #[error("Invalid agent address '{address}': {message}")]
    InvalidAddress {
        /// Address as configured.
        address: String,
        /// Why it was rejected.
        message: String,
    },

    /// An environment variable holds a value that cannot be used.
    #[error("Invalid value for {variable}: '{value}'")]
    InvalidValue {
        /// Name of the variable.
        variable: &'static str,
        /// Value as read.
        value: String,
    },

    /// `reqwest` could not build its client (e.g. TLS backend failure).
    #[error("Failed to build HTTP client: {message}")]
    Client {
        /// Error reported by `reqwest`.
        message: String,
    },
}

/// Where the agent is and how to talk to it.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpConfig {
    /// `scheme://host:port[/prefix]`; a bare `host:port` is treated as
    /// `http://`. A path prefix is kept, for agents behind a reverse proxy.
    pub address: String,
    /// ACL token sent as `X-Consul-Token`.
    pub token: Option<String>,
    /// Added as `dc=` to every request when set.
    pub datacenter: Option<String>,
    /// Bound on each non-streaming request.
    pub request_timeout: Duration,
    /// Bound on establishing a connection, streaming requests included.
    pub connect_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            token: None,
            datacenter: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl HttpConfig {
    /// Reads `CONSUL_HTTP_ADDR`, `CONSUL_HTTP_TOKEN`, `CONSUL_DATACENTER` and
    /// `CONSUL_HTTP_TIMEOUT_SECS` from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`HttpConfig::from_env`], reading variables through `lookup`.
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(address) = get("CONSUL_HTTP_ADDR") {
            config.address = address;
        }
        config.token = get("CONSUL_HTTP_TOKEN");
        config.datacenter = get("CONSUL_DATACENTER");
        if let Some(raw) = get("CONSUL_HTTP_TIMEOUT_SECS") {
            let secs = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .ok_or(ConfigError::InvalidValue {
                    variable: "CONSUL_HTTP_TIMEOUT_SECS",
                    value: raw.clone(),
                })?;
            config.request_timeout = Duration::from_secs(secs);
        }

        config.base_url()?;
        Ok(config)
    }

    /// Parses [`HttpConfig::address`] into the base URL requests are joined to.
    ///
    /// The result always ends in `/`, so relative API paths land under any
    /// path prefix the address carries.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let trimmed = self.address.trim().trim_end_matches('/');
        let candidate = if trimmed.contains("://") {
            format!("{trimmed}/")
        } else {
            format!("http://{trimmed}/")
        };

        let url = Url::parse(&candidate).map_err(|e| ConfigError::InvalidAddress {
            address: self.address.clone(),
            message: e.to_string(),
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::InvalidAddress {
                address: self.address.clone(),
                message: format!("unsupported scheme '{other}'"),
            }),
        }
    }
}
