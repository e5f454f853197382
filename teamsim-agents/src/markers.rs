//! Collaboration marker grammar.
//!
//! Agents ask teammates for input by embedding markers in their replies.
//! Two surface forms are understood:
//!
//! - **v2 (canonical):** `Developer -> Task for Developer [describe the API]`
//! - **v1 (legacy):** `[NEED_DEV: describe the API]`
//!
//! Both parse straight into [`Marker`] values. Text that does not match the
//! grammar is prose and requests nothing.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::roles::AgentRole;

/// Marker contract version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerSyntax {
    /// `[NEED_<TOKEN>: text]`
    V1,
    /// `<Name> -> Task for <Name> [text]`
    V2,
}

/// A single parsed collaboration marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub role: AgentRole,
    pub request: String,
    pub syntax: MarkerSyntax,
    /// Byte offset of the marker in the source text.
    offset: usize,
}

fn name_alternation() -> String {
    // Longest names first so "UX Designer" wins over any shorter prefix.
    let mut names: Vec<&str> = AgentRole::ALL.iter().map(|r| r.marker_name()).collect();
    names.sort_by_key(|n| std::cmp::Reverse(n.len()));
    names
        .iter()
        .map(|n| {
            n.split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+")
        })
        .collect::<Vec<_>>()
        .join("|")
}

static CANONICAL: LazyLock<Regex> = LazyLock::new(|| {
    let names = name_alternation();
    Regex::new(&format!(
        r"(?is)\b(?P<from>{names})\s*->\s*Task\s+for\s+(?P<to>{names})\s*\[(?P<req>[^\]]*)\]"
    ))
    .expect("canonical marker pattern is valid")
});

static LEGACY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\[\s*NEED_(?P<token>DEVOPS|DEV|TEST|PM|BA|UX)\s*:(?P<req>[^\]]*)\]")
        .expect("legacy marker pattern is valid")
});

/// Parses collaboration markers out of generated text.
#[derive(Debug, Clone, Copy)]
pub struct MarkerParser {
    accept_legacy: bool,
}

impl Default for MarkerParser {
    fn default() -> Self {
        Self {
            accept_legacy: true,
        }
    }
}

impl MarkerParser {
    pub fn new(accept_legacy: bool) -> Self {
        Self { accept_legacy }
    }

    /// All markers in `text`, in order of appearance.
    pub fn parse(&self, text: &str) -> Vec<Marker> {
        let mut markers = Vec::new();

        for caps in CANONICAL.captures_iter(text) {
            let (Some(whole), Some(from), Some(to)) = (caps.get(0), caps.name("from"), caps.name("to"))
            else {
                continue;
            };
            let from = AgentRole::from_marker_name(from.as_str());
            let to = AgentRole::from_marker_name(to.as_str());
            // "Tester -> Task for DevOps" names two roles; not a valid marker.
            let (Some(from), Some(to)) = (from, to) else { continue };
            if from != to {
                continue;
            }
            markers.push(Marker {
                role: to,
                request: caps.name("req").map(|m| m.as_str().trim()).unwrap_or("").to_string(),
                syntax: MarkerSyntax::V2,
                offset: whole.start(),
            });
        }

        if self.accept_legacy {
            for caps in LEGACY.captures_iter(text) {
                let (Some(whole), Some(token)) = (caps.get(0), caps.name("token")) else {
                    continue;
                };
                let Some(role) = AgentRole::from_legacy_token(token.as_str()) else {
                    continue;
                };
                markers.push(Marker {
                    role,
                    request: caps.name("req").map(|m| m.as_str().trim()).unwrap_or("").to_string(),
                    syntax: MarkerSyntax::V1,
                    offset: whole.start(),
                });
            }
        }

        markers.sort_by_key(|m| m.offset);
        markers
    }

    /// Requests addressed to roles other than `requester`.
    pub fn collaboration_requests(&self, text: &str, requester: AgentRole) -> CollaborationRequest {
        let mut request = CollaborationRequest::default();
        for marker in self.parse(text) {
            if marker.role == requester {
                continue;
            }
            request.push(marker.role, marker.request);
        }
        request
    }

    /// Instruction block appended to every prompt.
    pub fn instructions(&self) -> String {
        let mut out = String::from(
            "If you need input from other agents, request it on its own line using the format \
             <Role> -> Task for <Role> [what you need]:\n",
        );
        let examples = [
            (AgentRole::Dev, "technical implementation details"),
            (AgentRole::Tester, "testing requirements"),
            (AgentRole::Devops, "deployment needs"),
            (AgentRole::Pm, "project management aspects"),
            (AgentRole::Ba, "business analysis needs"),
            (AgentRole::Uxd, "design requirements"),
        ];
        let lines: Vec<String> = examples
            .iter()
            .map(|(role, what)| {
                let name = role.marker_name();
                format!("{name} -> Task for {name} [{what}]")
            })
            .collect();
        out.push_str(&lines.join("\n"));
        out
    }
}

/// Requests extracted from one agent's reply, keyed by target role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollaborationRequest {
    order: Vec<AgentRole>,
    by_role: BTreeMap<AgentRole, Vec<String>>,
}

impl CollaborationRequest {
    pub fn push(&mut self, role: AgentRole, request: String) {
        let entry = self.by_role.entry(role).or_insert_with(|| {
            self.order.push(role);
            Vec::new()
        });
        if !request.is_empty() {
            entry.push(request);
        }
    }

    /// Requested roles, in order of first appearance.
    pub fn roles(&self) -> &[AgentRole] {
        &self.order
    }

    pub fn requests_for(&self, role: AgentRole) -> Option<&[String]> {
        self.by_role.get(&role).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
