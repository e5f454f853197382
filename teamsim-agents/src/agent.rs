//! A persona-bound agent: prompt assembly, one generation call, marker scan.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::llm::{GenerationError, GenerationRequest, TextGenerator};
use crate::markers::{CollaborationRequest, MarkerParser};
use crate::memory::{ConversationMemory, Speaker};
use crate::persona;
use crate::roles::AgentRole;

/// Replies shorter than this (after trimming) count as failed generations.
pub const MIN_RESPONSE_CHARS: usize = 10;

/// Prior turns rendered into a prompt.
pub const HISTORY_WINDOW: usize = 10;

/// Project metadata shown to agents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectContext {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: String,
    /// Any further fields, rendered after the core three.
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, String>,
}

/// Everything an invocation sees beyond the user's message.
#[derive(Debug, Clone, Default)]
pub struct CollaborationContext {
    pub project: Option<ProjectContext>,
    /// Responses collected so far in this round, in invocation order.
    pub previous_responses: Vec<(AgentRole, String)>,
    /// Requests the parent agent addressed to this one.
    pub requests: Vec<String>,
}

/// Result of one successful invocation.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    pub role: AgentRole,
    pub text: String,
    pub collaboration: CollaborationRequest,
}

impl AgentResponse {
    /// Roles this reply asked for, in order of first appearance.
    pub fn requested_roles(&self) -> &[AgentRole] {
        self.collaboration.roles()
    }

    pub fn requests_for(&self, role: AgentRole) -> Option<&[String]> {
        self.collaboration.requests_for(role)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AgentError {
    #[error("User input cannot be empty")]
    EmptyInput,
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl AgentError {
    /// Text to show the user in place of a reply.
    pub fn user_message(&self) -> String {
        match self {
            AgentError::EmptyInput => self.to_string(),
            AgentError::Generation(e) => e.user_message(),
        }
    }
}

/// One team member.
#[derive(Debug, Clone, Copy)]
pub struct Agent {
    role: AgentRole,
    parser: MarkerParser,
}

impl Agent {
    pub fn new(role: AgentRole, parser: MarkerParser) -> Self {
        Self { role, parser }
    }

    /// Answer `user_input` within this persona.
    ///
    /// The user turn is remembered before generation; the reply only once it
    /// has passed validation.
    pub async fn respond(
        &self,
        generator: &dyn TextGenerator,
        memory: &mut ConversationMemory,
        user_input: &str,
        context: Option<&CollaborationContext>,
    ) -> Result<AgentResponse, AgentError> {
        if user_input.trim().is_empty() {
            return Err(AgentError::EmptyInput);
        }

        tracing::info!(role = %self.role, history = memory.len(), "Processing input");
        let prompt = self.build_prompt(memory, user_input, context);
        memory.add_user(user_input);

        let request = GenerationRequest {
            role: self.role,
            prompt,
            temperature: self.role.temperature(),
        };
        let text = match generator.generate(&request).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(role = %self.role, error = %e, "Generation failed");
                return Err(e.into());
            }
        };

        let trimmed_len = text.trim().chars().count();
        if trimmed_len == 0 {
            return Err(GenerationError::Empty.into());
        }
        if trimmed_len < MIN_RESPONSE_CHARS {
            return Err(GenerationError::TooShort { len: trimmed_len }.into());
        }
        tracing::debug!(role = %self.role, len = text.len(), "Generated response");

        memory.add_agent(&text);
        let collaboration = self.parser.collaboration_requests(&text, self.role);
        if !collaboration.is_empty() {
            tracing::info!(
                role = %self.role,
                wants = ?collaboration.roles(),
                "Collaboration requested"
            );
        }

        Ok(AgentResponse {
            role: self.role,
            text,
            collaboration,
        })
    }

    /// Assemble the full prompt for one call.
    pub fn build_prompt(
        &self,
        memory: &ConversationMemory,
        user_input: &str,
        context: Option<&CollaborationContext>,
    ) -> String {
        let mut prompt = format!("{}\n\n", persona::system_prompt(self.role));

        if !memory.is_empty() {
            prompt.push_str("Previous conversation history:\n");
            let label = self.role.key().to_uppercase();
            for turn in memory.recent(HISTORY_WINDOW) {
                match turn.speaker {
                    Speaker::User => prompt.push_str(&format!("User: {}\n", turn.text)),
                    Speaker::Agent => prompt.push_str(&format!("{label}: {}\n", turn.text)),
                }
            }
            prompt.push('\n');
        }

        if let Some(ctx) = context {
            if let Some(project) = &ctx.project {
                prompt.push_str("Project Context:\n");
                prompt.push_str(&format!("Name: {}\n", project.name));
                if !project.description.is_empty() {
                    prompt.push_str(&format!("Description: {}\n", project.description));
                }
                if !project.status.is_empty() {
                    prompt.push_str(&format!("Status: {}\n", project.status));
                }
                for (key, value) in &project.extra {
                    prompt.push_str(&format!("{key}: {value}\n"));
                }
                prompt.push('\n');
            }

            if !ctx.previous_responses.is_empty() {
                prompt.push_str("Previous agent responses:\n");
                for (role, text) in &ctx.previous_responses {
                    prompt.push_str(&format!("{}: {text}\n", role.key().to_uppercase()));
                }
                prompt.push('\n');
            }

            if !ctx.requests.is_empty() {
                prompt.push_str("Specific requests:\n");
                for request in &ctx.requests {
                    prompt.push_str(&format!("- {request}\n"));
                }
                prompt.push('\n');
            }
        }

        prompt.push_str(&format!("User input: {user_input}\n\n"));
        prompt.push_str(&self.parser.instructions());
        prompt
    }
}
