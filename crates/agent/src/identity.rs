//! Lazily resolved, memoized agent identity.
//!
//! The node name an agent reports is fetched at most once per
//! [`IdentityCache`] and then served from memory. There is no invalidation:
//! if the agent restarts under a different node name, the cache keeps the
//! first value for as long as it lives.
//!
//! A failed fetch is not memoized. Its error goes to the caller that made it
//! and to every caller that was already waiting on it; the next call after
//! that fetches again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{AgentError, AgentResult, TransportError};
use crate::transport::{Query, Transport};
use crate::types::AgentSelf;
use crate::NodeName;

pub(crate) const SELF_PATH: &str = "/v1/agent/self";

/// Fetches and decodes `GET /v1/agent/self`.
pub(crate) async fn fetch_self(transport: &dyn Transport) -> AgentResult<AgentSelf> {
    let value = transport.get_json(SELF_PATH, &Query::new()).await?;
    serde_json::from_value(value).map_err(|e| {
        AgentError::Transport(TransportError::Decode {
            message: e.to_string(),
        })
    })
}

/// Compute-once slot for the agent's node name.
///
/// Reads after resolution go through a lock-free fast path. Before resolution,
/// callers serialize on `resolve_lock`; the first one in performs the fetch and
/// the rest find the value already stored when they get the lock.
///
/// `failed_attempts` counts fetches that ended in an error, and the lock holds
/// the most recent such error. A caller that sees the count move while it
/// waited returns that error instead of fetching again. A cancelled fetch is
/// not counted, so callers waiting on it go on to fetch themselves.
pub struct IdentityCache {
    transport: Arc<dyn Transport>,
    node_name: OnceLock<NodeName>,
    failed_attempts: AtomicU64,
    resolve_lock: Mutex<Option<AgentError>>,
}

impl IdentityCache {
    /// Creates an unresolved cache that will fetch through `transport`.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            node_name: OnceLock::new(),
            failed_attempts: AtomicU64::new(0),
            resolve_lock: Mutex::new(None),
        }
    }

    /// Returns the memoized node name, or `None` if not yet resolved.
    pub fn cached(&self) -> Option<&NodeName> {
        self.node_name.get()
    }

    /// Returns the agent's node name, fetching it on first use.
    ///
    /// Callers that arrive while a fetch is in flight wait for it and share
    /// its outcome, success or failure. Cancelling `cancel` while the fetch is
    /// in flight returns [`TransportError::Cancelled`] and leaves the cache
    /// unresolved. Waiting for another caller's fetch is also abandoned on
    /// cancellation.
    pub async fn get_identity(&self, cancel: &CancellationToken) -> AgentResult<NodeName> {
        if let Some(name) = self.node_name.get() {
            return Ok(name.clone());
        }

        let seen = self.failed_attempts.load(Ordering::SeqCst);
        let mut last_failure = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransportError::Cancelled.into()),
            guard = self.resolve_lock.lock() => guard,
        };

        // Another caller may have resolved it while we waited for the lock.
        if let Some(name) = self.node_name.get() {
            return Ok(name.clone());
        }
        // Or failed, in which case its error is ours too.
        if self.failed_attempts.load(Ordering::SeqCst) != seen {
            if let Some(err) = last_failure.as_ref() {
                return Err(err.clone());
            }
        }

        debug!("resolving agent node name");
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransportError::Cancelled.into()),
            me = fetch_self(self.transport.as_ref()) => me,
        };
        let resolved = fetched.and_then(|me| {
            me.config
                .node_name
                .filter(|n| !n.as_str().is_empty())
                .ok_or(AgentError::MissingField {
                    endpoint: SELF_PATH,
                    field: "Config.NodeName",
                })
        });

        match resolved {
            Ok(name) => {
                // Only this task can set the slot while it holds the lock.
                let name = self.node_name.get_or_init(|| name).clone();
                *last_failure = None;
                info!(node_name = %name, "resolved agent node name");
                Ok(name)
            }
            Err(err) => {
                warn!(error = %err, "failed to resolve agent node name");
                *last_failure = Some(err.clone());
                self.failed_attempts.fetch_add(1, Ordering::SeqCst);
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for IdentityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityCache")
            .field("node_name", &self.node_name.get())
            .finish_non_exhaustive()
    }
}
