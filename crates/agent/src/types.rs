//! Data transfer objects for the `/v1/agent` endpoint family.
//!
//! Field names follow the agent's PascalCase JSON. Unknown fields are ignored
//! so newer agents can add to their payloads without breaking this client.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{CheckId, HealthStatus, NodeName, ServiceId};

// ---------------------------------------------------------------------------
// Log level
// ---------------------------------------------------------------------------

/// Minimum severity of log lines requested from `/v1/agent/monitor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Everything, including per-request tracing.
    Trace,
    /// Diagnostic detail.
    Debug,
    /// Normal operation. The agent's default.
    #[default]
    Info,
    /// Degraded but working.
    Warn,
    /// Failures only.
    Error,
}

impl LogLevel {
    /// Lowercase name, as sent in the `loglevel` query parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" | "err" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Self description
// ---------------------------------------------------------------------------

/// Response of `GET /v1/agent/self`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentSelf {
    /// Runtime configuration of the agent.
    #[serde(default)]
    pub config: AgentSelfConfig,
    /// The agent's own gossip-pool membership entry.
    #[serde(default)]
    pub member: Option<AgentMember>,
}

/// The `Config` object nested in [`AgentSelf`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentSelfConfig {
    /// Name the agent registered under. Absent on a malformed response.
    #[serde(default)]
    pub node_name: Option<NodeName>,
    /// Datacenter the agent belongs to.
    #[serde(default)]
    pub datacenter: Option<String>,
    /// Agent release, e.g. `1.17.2`.
    #[serde(default)]
    pub version: Option<String>,
    /// `true` for a server agent, `false` for a client agent.
    #[serde(default)]
    pub server: bool,
}

// ---------------------------------------------------------------------------
// Catalog entries as seen by the local agent
// ---------------------------------------------------------------------------

/// A node in the agent's gossip pool (`GET /v1/agent/members`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentMember {
    /// Node name of the member.
    pub name: String,
    /// Gossip address.
    pub addr: String,
    /// Gossip port.
    pub port: u16,
    /// Serf tags such as `role`, `dc` and `build`.
    #[serde(default)]
    pub tags: HashMap<String, String>,
    /// Serf member status: 1 alive, 2 leaving, 3 left, 4 failed.
    pub status: i32,
}

/// A service registered with the local agent (`GET /v1/agent/services`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgentService {
    #[serde(rename = "ID")]
    pub id: ServiceId,
    #[serde(rename = "Service")]
    pub service: String,
    #[serde(rename = "Tags", default)]
    pub tags: Vec<String>,
    #[serde(rename = "Port", default)]
    pub port: u16,
    #[serde(rename = "Address", default)]
    pub address: String,
    #[serde(rename = "Meta", default)]
    pub meta: HashMap<String, String>,
}

/// A health check registered with the local agent (`GET /v1/agent/checks`).
///
/// `status` goes through [`HealthStatus`] decoding, so an agent reporting a
/// status outside both vocabularies fails the whole listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgentCheck {
    #[serde(rename = "Node")]
    pub node: String,
    #[serde(rename = "CheckID")]
    pub check_id: CheckId,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Status")]
    pub status: HealthStatus,
    #[serde(rename = "Notes", default)]
    pub notes: String,
    #[serde(rename = "Output", default)]
    pub output: String,
    #[serde(rename = "ServiceID", default)]
    pub service_id: String,
    #[serde(rename = "ServiceName", default)]
    pub service_name: String,
}

// ---------------------------------------------------------------------------
// Registrations
// ---------------------------------------------------------------------------

/// Body of `PUT /v1/agent/service/register`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServiceRegistration {
    #[serde(rename = "ID", skip_serializing_if = "Option::is_none")]
    pub id: Option<ServiceId>,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Tags", skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(rename = "Port", skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(rename = "Address", skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(rename = "Meta", skip_serializing_if = "HashMap::is_empty")]
    pub meta: HashMap<String, String>,
    #[serde(rename = "Check", skip_serializing_if = "Option::is_none")]
    pub check: Option<CheckDefinition>,
}

/// A check definition, either embedded in a [`ServiceRegistration`] or
/// registered on its own via [`CheckRegistration`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckDefinition {
    /// TTL for externally updated checks, e.g. `"15s"`.
    #[serde(rename = "TTL", skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
    #[serde(rename = "HTTP", skip_serializing_if = "Option::is_none")]
    pub http: Option<String>,
    #[serde(rename = "TCP", skip_serializing_if = "Option::is_none")]
    pub tcp: Option<String>,
    #[serde(rename = "Interval", skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(rename = "Timeout", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    /// Initial status; serialized with the current vocabulary.
    #[serde(rename = "Status", skip_serializing_if = "Option::is_none")]
    pub status: Option<HealthStatus>,
    #[serde(rename = "Notes", skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(
        rename = "DeregisterCriticalServiceAfter",
        skip_serializing_if = "Option::is_none"
    )]
    pub deregister_critical_service_after: Option<String>,
}

/// Body of `PUT /v1/agent/check/register`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckRegistration {
    #[serde(rename = "ID", skip_serializing_if = "Option::is_none")]
    pub id: Option<CheckId>,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "ServiceID", skip_serializing_if = "Option::is_none")]
    pub service_id: Option<ServiceId>,
    #[serde(flatten)]
    pub definition: CheckDefinition,
}

/// Body of `PUT /v1/agent/check/update/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TtlUpdate {
    #[serde(rename = "Status")]
    pub status: HealthStatus,
    #[serde(rename = "Output")]
    pub output: String,
}
