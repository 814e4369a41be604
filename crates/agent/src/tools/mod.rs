//! Tool registry. Each tool owns a declaration (name, description,
//! JSON schema for its arguments) and an execution body. Tools never
//! fail the loop: faults are folded into the JSON payload the model
//! sees, so it can apologize or re-ask in its own words.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use portero_gateway::{BackendError, CoreGateway};

pub mod account;
pub mod complaint;
pub mod identity;
pub mod properties;
pub mod requirements;
pub mod scheduling;

pub use account::AccountStatusTool;
pub use complaint::CreateComplaintTool;
pub use identity::{VerifyIdentityTool, VerifyOtpTool, VERIFY_OTP_NAME};
pub use properties::{AvailableCitiesTool, SearchPropertiesTool};
pub use requirements::RentalRequirementsTool;
pub use scheduling::{RequestAppraisalTool, ScheduleMeetingTool};

#[derive(Clone, Debug)]
pub struct ToolDeclaration {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

/// Per-invocation conversation context passed to every tool.
#[derive(Clone, Debug)]
pub struct ToolContext {
    pub jid: String,
    pub core_client_id: Option<String>,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn declaration(&self) -> ToolDeclaration;

    async fn execute(&self, args: &Value, ctx: &ToolContext) -> Value;
}

pub fn error_value(message: impl Into<String>) -> Value {
    json!({ "error": true, "message": message.into() })
}

pub fn auth_required_value(message: impl Into<String>) -> Value {
    json!({ "error": true, "requires_auth": true, "message": message.into() })
}

pub fn backend_error_value(error: &BackendError) -> Value {
    json!({
        "error": true,
        "status": error.status_code,
        "message": error.message,
    })
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<&'static str, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.declaration().name, tool);
    }

    /// Every dispatchable tool is declared to the model; the two sets
    /// cannot drift apart because both come from this map.
    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        let mut declarations: Vec<ToolDeclaration> =
            self.tools.values().map(|tool| tool.declaration()).collect();
        declarations.sort_by(|a, b| a.name.cmp(b.name));
        declarations
    }

    pub async fn execute(&self, name: &str, args: &Value, ctx: &ToolContext) -> Value {
        match self.tools.get(name) {
            Some(tool) => tool.execute(args, ctx).await,
            None => {
                tracing::warn!(event_name = "agent.unknown_tool", tool = name, "model requested unknown tool");
                error_value(format!("tool `{name}` is not available"))
            }
        }
    }
}

/// The full catalogue wired against one gateway.
pub fn standard_registry(gateway: Arc<dyn CoreGateway>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(AccountStatusTool::new(gateway.clone())));
    registry.register(Arc::new(CreateComplaintTool::new(gateway.clone())));
    registry.register(Arc::new(VerifyIdentityTool::new(gateway.clone())));
    registry.register(Arc::new(VerifyOtpTool::new(gateway.clone())));
    registry.register(Arc::new(SearchPropertiesTool::new(gateway.clone())));
    registry.register(Arc::new(ScheduleMeetingTool::new(gateway.clone())));
    registry.register(Arc::new(RentalRequirementsTool));
    registry.register(Arc::new(RequestAppraisalTool));
    registry.register(Arc::new(AvailableCitiesTool::new(gateway)));
    registry
}
