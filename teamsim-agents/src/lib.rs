//! teamsim-agents: a simulated software team built from LLM personas.
//!
//! Six agents (project manager, developer, tester, devops, business analyst,
//! UX designer) answer within their persona and ask each other for input
//! through inline collaboration markers. The [`orchestrator`] resolves those
//! requests into one composite reply per user message.

pub mod agent;
pub mod llm;
pub mod markers;
pub mod memory;
pub mod orchestrator;
pub mod persona;
pub mod roles;

pub use agent::{Agent, AgentError, AgentResponse, CollaborationContext, ProjectContext};
pub use llm::{GenerationError, LlmClient, LlmConfig, Provider, ScriptedGenerator, TextGenerator};
pub use markers::{CollaborationRequest, MarkerParser, MarkerSyntax};
pub use memory::{ConversationMemory, Session, SessionRoster, DEFAULT_SESSION};
pub use orchestrator::{CompositeReply, Contribution, OrchestrationError, Orchestrator};
pub use roles::AgentRole;
