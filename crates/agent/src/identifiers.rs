//! Newtype identifiers for agent-side entities.
//!
//! Node names, service IDs and check IDs are all strings on the wire. Wrapping
//! each in its own type prevents passing a [`ServiceId`] where a [`CheckId`]
//! is expected.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display, Borrow<str>.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id! {
    /// The name an agent reports for the node it runs on (`Config.NodeName`).
    ///
    /// Resolved once per client by [`crate::IdentityCache`].
    NodeName
}

string_id! {
    /// Identifies a service registered with the local agent.
    ServiceId
}

string_id! {
    /// Identifies a health check registered with the local agent.
    ///
    /// TTL checks are updated by ID through the legacy
    /// `/v1/agent/check/{status}/{id}` or current `/v1/agent/check/update/{id}`
    /// endpoints.
    CheckId
}
