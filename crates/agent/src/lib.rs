//! The conversational agent: prompt assembly, the model seam, the tool
//! registry, and the bounded tool-calling loop that turns an inbound
//! WhatsApp message into one reply.

pub mod context;
pub mod directive;
pub mod gemini;
pub mod llm;
pub mod orchestrator;
pub mod tools;

pub use context::{ContextBuilder, PromptContext};
pub use gemini::GeminiModel;
pub use llm::{
    ChatModel, ChatRole, ChatTurn, ModelError, ModelReply, ModelSession, ScriptedModel,
    ToolCallRequest, ToolResultPart,
};
pub use orchestrator::{AgentReply, OrchestrationError, Orchestrator, RespondRequest, VerifiedLink};
pub use tools::{standard_registry, Tool, ToolContext, ToolDeclaration, ToolRegistry};
