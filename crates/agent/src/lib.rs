//! Client-side domain for a service-discovery agent's local control API.
//!
//! This crate contains the agent endpoint façade and the pieces of it that are
//! more than request/response plumbing. Infrastructure crates implement the
//! [`Transport`] trait defined here; they never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no HTTP dependencies.
//! It defines *what* is sent to the agent; `transport-http` defines *how*.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`status`] | [`HealthStatus`] and its current/legacy wire vocabularies |
//! | [`identity`] | [`IdentityCache`]: the memoized node name |
//! | [`logs`] | [`LogStreamReader`]: line-by-line reading of the live log stream |
//! | [`agent`] | [`Agent`]: the `/v1/agent` endpoint façade |
//! | [`transport`] | The [`Transport`] port trait |
//! | [`identifiers`] | Newtype identifiers (`NodeName`, `CheckId`, `ServiceId`) |
//! | [`types`] | Request and response DTOs, [`LogLevel`] |
//! | [`errors`] | Error and retry-policy types |

pub mod agent;
pub mod errors;
pub mod identifiers;
pub mod identity;
pub mod logs;
pub mod status;
pub mod transport;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use agent::Agent;
pub use errors::{AgentError, AgentResult, RetryPolicy, StatusDecodeError, TransportError};
pub use identifiers::{CheckId, NodeName, ServiceId};
pub use identity::IdentityCache;
pub use logs::{LogStreamReader, ReaderState, MAX_LINE_BYTES};
pub use status::HealthStatus;
pub use transport::{ByteStream, Query, Transport};
pub use types::{
    AgentCheck, AgentMember, AgentSelf, AgentSelfConfig, AgentService, CheckDefinition,
    CheckRegistration, LogLevel, ServiceRegistration, TtlUpdate,
};

// Re-exported so callers can cancel operations without naming tokio-util.
pub use tokio_util::sync::CancellationToken;
