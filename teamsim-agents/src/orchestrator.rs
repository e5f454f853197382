//! Collaboration resolution.
//!
//! One user message starts at one agent. Every role that agent asks for is
//! queued; queued roles are invoked breadth-first with the responses gathered
//! so far, and may queue further roles in turn. A role is invoked at most once
//! per message, which bounds a round at six invocations and breaks request
//! cycles.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use serde::Serialize;

use crate::agent::{Agent, AgentError, AgentResponse, CollaborationContext, ProjectContext};
use crate::llm::TextGenerator;
use crate::markers::MarkerParser;
use crate::memory::Session;
use crate::roles::{AgentRole, UnknownRole};

/// One agent's part of a composite reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contribution {
    pub role: AgentRole,
    pub text: String,
}

/// All contributions for one user message, in invocation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompositeReply {
    pub contributions: Vec<Contribution>,
}

impl CompositeReply {
    pub fn roles(&self) -> Vec<AgentRole> {
        self.contributions.iter().map(|c| c.role).collect()
    }

    /// `LABEL: text` blocks separated by blank lines.
    pub fn text(&self) -> String {
        self.contributions
            .iter()
            .map(|c| format!("{}: {}", c.role.display_label(), c.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    #[error("Message field is required")]
    EmptyMessage,
    #[error(transparent)]
    UnknownRole(#[from] UnknownRole),
    #[error("{role} agent failed: {source}")]
    StartingAgent {
        role: AgentRole,
        #[source]
        source: AgentError,
    },
}

impl OrchestrationError {
    /// Input problems the caller can fix, as opposed to backend failures.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            OrchestrationError::EmptyMessage | OrchestrationError::UnknownRole(_)
        )
    }
}

/// Work state for one user message.
#[derive(Default)]
struct Resolution {
    queue: VecDeque<(AgentRole, AgentRole)>,
    invoked: HashSet<AgentRole>,
    results: Vec<AgentResponse>,
}

impl Resolution {
    fn record(&mut self, response: AgentResponse) {
        let role = response.role;
        for &wanted in response.requested_roles() {
            if !self.invoked.contains(&wanted) && wanted != role {
                self.queue.push_back((role, wanted));
            }
        }
        self.invoked.insert(role);
        self.results.push(response);
    }

    fn result_for(&self, role: AgentRole) -> Option<&AgentResponse> {
        self.results.iter().find(|r| r.role == role)
    }

    fn context_for(
        &self,
        parent: AgentRole,
        target: AgentRole,
        project: Option<&ProjectContext>,
    ) -> CollaborationContext {
        CollaborationContext {
            project: project.cloned(),
            previous_responses: self
                .results
                .iter()
                .map(|r| (r.role, r.text.clone()))
                .collect(),
            requests: self
                .result_for(parent)
                .and_then(|r| r.requests_for(target))
                .map(<[String]>::to_vec)
                .unwrap_or_default(),
        }
    }
}

/// Drives agents through one collaboration round per user message.
pub struct Orchestrator {
    generator: Arc<dyn TextGenerator>,
    parser: MarkerParser,
}

impl Orchestrator {
    pub fn new(generator: Arc<dyn TextGenerator>, parser: MarkerParser) -> Self {
        Self { generator, parser }
    }

    /// Resolve `user_input` starting at the role keyed `starting_role`.
    pub async fn handle_message(
        &self,
        session: &mut Session,
        user_input: &str,
        starting_role: &str,
        project: Option<&ProjectContext>,
    ) -> Result<CompositeReply, OrchestrationError> {
        if user_input.trim().is_empty() {
            return Err(OrchestrationError::EmptyMessage);
        }
        let start: AgentRole = starting_role.parse()?;
        self.resolve(session, user_input, start, project).await
    }

    /// Resolve starting at an already-validated role.
    pub async fn resolve(
        &self,
        session: &mut Session,
        user_input: &str,
        start: AgentRole,
        project: Option<&ProjectContext>,
    ) -> Result<CompositeReply, OrchestrationError> {
        tracing::info!(role = %start, "Starting interaction");
        let mut state = Resolution::default();

        let initial_context = project.map(|p| CollaborationContext {
            project: Some(p.clone()),
            ..Default::default()
        });
        let first = Agent::new(start, self.parser)
            .respond(
                self.generator.as_ref(),
                session.memory_mut(start),
                user_input,
                initial_context.as_ref(),
            )
            .await
            .map_err(|source| OrchestrationError::StartingAgent { role: start, source })?;
        state.record(first);

        while let Some((parent, target)) = state.queue.pop_front() {
            if state.invoked.contains(&target) {
                tracing::debug!(%parent, %target, "Skipping, already answered");
                continue;
            }

            let context = state.context_for(parent, target, project);
            tracing::debug!(%parent, %target, requests = context.requests.len(), "Invoking collaborator");

            let agent = Agent::new(target, self.parser);
            match agent
                .respond(
                    self.generator.as_ref(),
                    session.memory_mut(target),
                    user_input,
                    Some(&context),
                )
                .await
            {
                Ok(response) => state.record(response),
                Err(e) => {
                    tracing::warn!(%parent, %target, error = %e, "Collaborator failed, omitting");
                }
            }
        }

        let reply = CompositeReply {
            contributions: state
                .results
                .into_iter()
                .map(|r| Contribution {
                    role: r.role,
                    text: r.text,
                })
                .collect(),
        };
        tracing::info!(roles = ?reply.roles(), "Interaction complete");
        Ok(reply)
    }
}
