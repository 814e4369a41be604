use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use portero_gateway::CoreGateway;

use super::{auth_required_value, backend_error_value, Tool, ToolContext, ToolDeclaration};

pub struct AccountStatusTool {
    gateway: Arc<dyn CoreGateway>,
}

impl AccountStatusTool {
    pub fn new(gateway: Arc<dyn CoreGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Tool for AccountStatusTool {
    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: "check_account_status",
            description: "Consulta el estado de cuenta, saldo pendiente y deuda del cliente \
                          actual. Úsalo cuando el usuario pregunte cuánto debe, su saldo o \
                          estado de cuenta.",
            parameters: json!({ "type": "object", "properties": {} }),
        }
    }

    async fn execute(&self, _args: &Value, ctx: &ToolContext) -> Value {
        let Some(client_id) = ctx.core_client_id.as_deref() else {
            return auth_required_value(
                "Usuario no identificado. No se puede consultar el saldo de un usuario invitado.",
            );
        };

        match self.gateway.account_status(client_id).await {
            Ok(status) => serde_json::to_value(&status)
                .unwrap_or_else(|e| super::error_value(format!("status encode failed: {e}"))),
            Err(error) => backend_error_value(&error),
        }
    }
}
