//! The fixed team roster.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the six fixed agent identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Pm,
    Dev,
    Tester,
    Devops,
    Ba,
    Uxd,
}

impl AgentRole {
    /// Every role, in roster order.
    pub const ALL: [AgentRole; 6] = [
        AgentRole::Pm,
        AgentRole::Dev,
        AgentRole::Tester,
        AgentRole::Devops,
        AgentRole::Ba,
        AgentRole::Uxd,
    ];

    /// Short key used on the wire (`"pm"`, `"uxd"`, ...).
    pub fn key(self) -> &'static str {
        match self {
            AgentRole::Pm => "pm",
            AgentRole::Dev => "dev",
            AgentRole::Tester => "tester",
            AgentRole::Devops => "devops",
            AgentRole::Ba => "ba",
            AgentRole::Uxd => "uxd",
        }
    }

    /// Label that prefixes this role's block in a composite reply.
    pub fn display_label(self) -> &'static str {
        match self {
            AgentRole::Pm => "PM",
            AgentRole::Dev => "DEVELOPER",
            AgentRole::Tester => "TESTER",
            AgentRole::Devops => "DEVOPS",
            AgentRole::Ba => "BUSINESS ANALYST",
            AgentRole::Uxd => "UX DESIGNER",
        }
    }

    /// Name used in `<Name> -> Task for <Name> [...]` markers.
    pub fn marker_name(self) -> &'static str {
        match self {
            AgentRole::Pm => "PM",
            AgentRole::Dev => "Developer",
            AgentRole::Tester => "Tester",
            AgentRole::Devops => "DevOps",
            AgentRole::Ba => "Business Analyst",
            AgentRole::Uxd => "UX Designer",
        }
    }

    /// Token used in legacy `[NEED_<TOKEN>: ...]` markers.
    pub fn legacy_token(self) -> &'static str {
        match self {
            AgentRole::Pm => "PM",
            AgentRole::Dev => "DEV",
            AgentRole::Tester => "TEST",
            AgentRole::Devops => "DEVOPS",
            AgentRole::Ba => "BA",
            AgentRole::Uxd => "UX",
        }
    }

    /// Sampling temperature. Coordination roles get more room than builders.
    pub fn temperature(self) -> f32 {
        match self {
            AgentRole::Pm | AgentRole::Ba | AgentRole::Uxd => 0.7,
            AgentRole::Dev | AgentRole::Tester | AgentRole::Devops => 0.2,
        }
    }

    /// Resolve a marker name (`"business analyst"`) back to its role.
    pub fn from_marker_name(name: &str) -> Option<Self> {
        let normalized = name.split_whitespace().collect::<Vec<_>>().join(" ");
        Self::ALL
            .into_iter()
            .find(|r| r.marker_name().eq_ignore_ascii_case(&normalized))
    }

    /// Resolve a legacy marker token (`"test"`) back to its role.
    pub fn from_legacy_token(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|r| r.legacy_token().eq_ignore_ascii_case(token.trim()))
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Error returned when a string names no known role.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid agent type: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for AgentRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.key() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}
