//! Health status and its two wire vocabularies.
//!
//! Two generations of the agent protocol are live at the same time. The TTL
//! path-segment endpoints (`/v1/agent/check/pass/{id}` and friends) take the
//! legacy words `pass`, `warn` and `fail`. Payload fields such as `Status` in
//! `/v1/agent/check/update/{id}` and in check listings use `passing`,
//! `warning` and `critical`. Both are first-class; [`HealthStatus`] is the
//! only place either mapping is written down.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::StatusDecodeError;

/// The three-valued health state of a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HealthStatus {
    /// The check is healthy.
    Passing,
    /// The check is degraded but not failing.
    Warning,
    /// The check is failing.
    Critical,
}

impl HealthStatus {
    /// All states, in severity order.
    pub const ALL: [HealthStatus; 3] = [
        HealthStatus::Passing,
        HealthStatus::Warning,
        HealthStatus::Critical,
    ];

    /// Decodes a wire string from either vocabulary.
    ///
    /// Matching is exact: no trimming and no case folding. Anything other than
    /// the six known words is an error; callers must not substitute a default.
    pub fn decode(text: &str) -> Result<Self, StatusDecodeError> {
        match text {
            "pass" | "passing" => Ok(HealthStatus::Passing),
            "warn" | "warning" => Ok(HealthStatus::Warning),
            "fail" | "critical" => Ok(HealthStatus::Critical),
            other => Err(StatusDecodeError::InvalidStatus {
                value: other.to_string(),
            }),
        }
    }

    /// Current-generation encoding, used in JSON payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Passing => "passing",
            HealthStatus::Warning => "warning",
            HealthStatus::Critical => "critical",
        }
    }

    /// Legacy encoding, used as a path segment by the TTL endpoints.
    pub fn as_legacy_str(self) -> &'static str {
        match self {
            HealthStatus::Passing => "pass",
            HealthStatus::Warning => "warn",
            HealthStatus::Critical => "fail",
        }
    }

    /// Returns `true` if `text` is one of the legacy words.
    pub fn is_legacy_word(text: &str) -> bool {
        Self::ALL.iter().any(|s| s.as_legacy_str() == text)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HealthStatus {
    type Err = StatusDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for HealthStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for HealthStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        HealthStatus::decode(&raw).map_err(serde::de::Error::custom)
    }
}
