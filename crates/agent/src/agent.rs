//! The `/v1/agent` endpoint façade.
//!
//! [`Agent`] composes the [`Transport`] port with the three stateful or
//! protocol-sensitive pieces of this crate: the [`IdentityCache`], the
//! [`LogStreamReader`] and the [`HealthStatus`] codec. Everything else here is
//! request plumbing.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::errors::{AgentError, AgentResult, TransportError};
use crate::identity::{fetch_self, IdentityCache};
use crate::logs::LogStreamReader;
use crate::transport::{Query, Transport};
use crate::types::{
    AgentCheck, AgentMember, AgentSelf, AgentService, CheckRegistration, LogLevel,
    ServiceRegistration, TtlUpdate,
};
use crate::{CheckId, HealthStatus, NodeName, ServiceId};

const MEMBERS_PATH: &str = "/v1/agent/members";
const SERVICES_PATH: &str = "/v1/agent/services";
const CHECKS_PATH: &str = "/v1/agent/checks";
const MONITOR_PATH: &str = "/v1/agent/monitor";
const MAINTENANCE_PATH: &str = "/v1/agent/maintenance";

/// Client for the local agent's control API.
///
/// Cheap to clone; clones share one transport and one identity cache.
#[derive(Clone)]
pub struct Agent {
    transport: Arc<dyn Transport>,
    identity: Arc<IdentityCache>,
}

impl Agent {
    /// Creates a client that sends every request through `transport`.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            identity: Arc::new(IdentityCache::new(transport.clone())),
            transport,
        }
    }

    // -----------------------------------------------------------------------
    // Identity and membership
    // -----------------------------------------------------------------------

    /// Fetches the agent's full self description. Never cached.
    pub async fn self_info(&self) -> AgentResult<AgentSelf> {
        fetch_self(self.transport.as_ref()).await
    }

    /// Returns the agent's node name, fetching it once per [`Agent`] (and its
    /// clones) and serving it from memory afterwards.
    pub async fn node_name(&self, cancel: &CancellationToken) -> AgentResult<NodeName> {
        self.identity.get_identity(cancel).await
    }

    /// Lists the members of the LAN gossip pool, or the WAN pool when `wan`.
    pub async fn members(&self, wan: bool) -> AgentResult<Vec<AgentMember>> {
        let mut query = Query::new();
        if wan {
            query.push(("wan".into(), "1".into()));
        }
        self.get(MEMBERS_PATH, &query).await
    }

    /// Asks the agent to join the cluster through `address`.
    pub async fn join(&self, address: &str, wan: bool) -> AgentResult<()> {
        let mut query = Query::new();
        if wan {
            query.push(("wan".into(), "1".into()));
        }
        let path = format!("/v1/agent/join/{}", segment(address)?);
        self.put(&path, &query, None).await
    }

    /// Makes the agent leave the cluster gracefully and shut down.
    pub async fn leave(&self) -> AgentResult<()> {
        self.put("/v1/agent/leave", &Query::new(), None).await
    }

    /// Transitions a failed node to the `left` state.
    pub async fn force_leave(&self, node: &str) -> AgentResult<()> {
        let path = format!("/v1/agent/force-leave/{}", segment(node)?);
        self.put(&path, &Query::new(), None).await
    }

    /// Puts the whole node into maintenance mode.
    pub async fn enable_node_maintenance(&self, reason: Option<&str>) -> AgentResult<()> {
        let mut query: Query = vec![("enable".into(), "true".into())];
        if let Some(reason) = reason {
            query.push(("reason".into(), reason.to_string()));
        }
        self.put(MAINTENANCE_PATH, &query, None).await
    }

    /// Takes the node out of maintenance mode.
    pub async fn disable_node_maintenance(&self) -> AgentResult<()> {
        let query: Query = vec![("enable".into(), "false".into())];
        self.put(MAINTENANCE_PATH, &query, None).await
    }

    // -----------------------------------------------------------------------
    // Services
    // -----------------------------------------------------------------------

    /// Lists the services registered with the agent, keyed by service ID.
    pub async fn services(&self) -> AgentResult<HashMap<ServiceId, AgentService>> {
        self.get(SERVICES_PATH, &Query::new()).await
    }

    /// Registers a service with the agent, replacing one with the same ID.
    #[instrument(skip_all, fields(service = %registration.name))]
    pub async fn register_service(&self, registration: &ServiceRegistration) -> AgentResult<()> {
        let body = encode(registration)?;
        self.put("/v1/agent/service/register", &Query::new(), Some(body))
            .await
    }

    /// Removes a service and its checks from the agent.
    pub async fn deregister_service(&self, service_id: &ServiceId) -> AgentResult<()> {
        let path = format!(
            "/v1/agent/service/deregister/{}",
            segment(service_id.as_str())?
        );
        self.put(&path, &Query::new(), None).await
    }

    // -----------------------------------------------------------------------
    // Checks
    // -----------------------------------------------------------------------

    /// Lists the checks registered with the agent.
    ///
    /// A check whose `Status` is outside both status vocabularies fails the
    /// call with [`AgentError::InvalidStatus`].
    pub async fn checks(&self) -> AgentResult<HashMap<CheckId, AgentCheck>> {
        let value = self.transport.get_json(CHECKS_PATH, &Query::new()).await?;
        if let Some(entries) = value.as_object() {
            for entry in entries.values() {
                if let Some(status) = entry.get("Status").and_then(|s| s.as_str()) {
                    HealthStatus::decode(status)?;
                }
            }
        }
        decode(value)
    }

    /// Registers a check with the agent.
    #[instrument(skip_all, fields(check = %registration.name))]
    pub async fn register_check(&self, registration: &CheckRegistration) -> AgentResult<()> {
        let body = encode(registration)?;
        self.put("/v1/agent/check/register", &Query::new(), Some(body))
            .await
    }

    /// Removes a check from the agent.
    pub async fn deregister_check(&self, check_id: &CheckId) -> AgentResult<()> {
        let path = format!(
            "/v1/agent/check/deregister/{}",
            segment(check_id.as_str())?
        );
        self.put(&path, &Query::new(), None).await
    }

    // -----------------------------------------------------------------------
    // TTL checks
    // -----------------------------------------------------------------------

    /// Marks a TTL check as passing through the legacy endpoint.
    pub async fn pass_ttl(&self, check_id: &CheckId, note: Option<&str>) -> AgentResult<()> {
        self.legacy_ttl(check_id, HealthStatus::Passing, note).await
    }

    /// Marks a TTL check as warning through the legacy endpoint.
    pub async fn warn_ttl(&self, check_id: &CheckId, note: Option<&str>) -> AgentResult<()> {
        self.legacy_ttl(check_id, HealthStatus::Warning, note).await
    }

    /// Marks a TTL check as critical through the legacy endpoint.
    pub async fn fail_ttl(&self, check_id: &CheckId, note: Option<&str>) -> AgentResult<()> {
        self.legacy_ttl(check_id, HealthStatus::Critical, note).await
    }

    /// `PUT /v1/agent/check/{pass|warn|fail}/{id}`, optionally with a `note`.
    #[instrument(skip_all, fields(check = %check_id, status = %status))]
    pub async fn legacy_ttl(
        &self,
        check_id: &CheckId,
        status: HealthStatus,
        note: Option<&str>,
    ) -> AgentResult<()> {
        let mut query = Query::new();
        if let Some(note) = note {
            query.push(("note".into(), note.to_string()));
        }
        let path = format!(
            "/v1/agent/check/{}/{}",
            status.as_legacy_str(),
            segment(check_id.as_str())?
        );
        self.put(&path, &query, None).await
    }

    /// `PUT /v1/agent/check/update/{id}` with the current status vocabulary.
    #[instrument(skip_all, fields(check = %check_id, status = %status))]
    pub async fn update_ttl(
        &self,
        check_id: &CheckId,
        output: &str,
        status: HealthStatus,
    ) -> AgentResult<()> {
        let body = encode(&TtlUpdate {
            status,
            output: output.to_string(),
        })?;
        let path = format!("/v1/agent/check/update/{}", segment(check_id.as_str())?);
        self.put(&path, &Query::new(), Some(body)).await
    }

    // -----------------------------------------------------------------------
    // Log streaming
    // -----------------------------------------------------------------------

    /// Opens the agent's plain-text log stream at `level` and above.
    ///
    /// Cancelling `cancel` aborts the connection attempt or, once connected,
    /// the reader's current and future reads.
    pub async fn monitor(
        &self,
        level: LogLevel,
        cancel: &CancellationToken,
    ) -> AgentResult<LogStreamReader> {
        self.open_monitor(level, false, cancel).await
    }

    /// Like [`Agent::monitor`], but each line is a JSON-encoded log record.
    pub async fn monitor_json(
        &self,
        level: LogLevel,
        cancel: &CancellationToken,
    ) -> AgentResult<LogStreamReader> {
        self.open_monitor(level, true, cancel).await
    }

    async fn open_monitor(
        &self,
        level: LogLevel,
        json: bool,
        cancel: &CancellationToken,
    ) -> AgentResult<LogStreamReader> {
        let mut query: Query = vec![("loglevel".into(), level.as_str().to_string())];
        if json {
            query.push(("logjson".into(), "true".into()));
        }
        debug!(level = %level, json, "opening agent log stream");

        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransportError::Cancelled.into()),
            stream = self.transport.stream_get(MONITOR_PATH, &query) => stream?,
        };
        Ok(LogStreamReader::new(stream).with_cancellation(cancel.clone()))
    }

    // -----------------------------------------------------------------------
    // Plumbing
    // -----------------------------------------------------------------------

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &Query) -> AgentResult<T> {
        let value = self.transport.get_json(path, query).await?;
        decode(value)
    }

    async fn put(
        &self,
        path: &str,
        query: &Query,
        body: Option<serde_json::Value>,
    ) -> AgentResult<()> {
        self.transport.put(path, query, body).await?;
        Ok(())
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

fn decode<T: DeserializeOwned>(value: serde_json::Value) -> AgentResult<T> {
    serde_json::from_value(value).map_err(|e| {
        AgentError::Transport(TransportError::Decode {
            message: e.to_string(),
        })
    })
}

fn encode<T: Serialize>(body: &T) -> AgentResult<serde_json::Value> {
    serde_json::to_value(body).map_err(|e| AgentError::InvalidArgument {
        message: e.to_string(),
    })
}

/// Rejects values that would change the shape of a templated path.
fn segment(value: &str) -> AgentResult<&str> {
    if value.is_empty() || value.contains(['/', '?', '#']) {
        return Err(AgentError::InvalidArgument {
            message: format!("'{value}' cannot be used as a path segment"),
        });
    }
    Ok(value)
}
