use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use portero_gateway::{ComplaintCategory, ComplaintRequest, ComplaintUrgency, CoreGateway};

use super::{auth_required_value, backend_error_value, error_value, Tool, ToolContext, ToolDeclaration};

pub struct CreateComplaintTool {
    gateway: Arc<dyn CoreGateway>,
}

impl CreateComplaintTool {
    pub fn new(gateway: Arc<dyn CoreGateway>) -> Self {
        Self { gateway }
    }
}

fn parse_category(value: Option<&str>) -> ComplaintCategory {
    match value {
        Some("plumbing") => ComplaintCategory::Plumbing,
        Some("electric") => ComplaintCategory::Electric,
        Some("heating") => ComplaintCategory::Heating,
        Some("cleaning") => ComplaintCategory::Cleaning,
        Some("security") => ComplaintCategory::Security,
        _ => ComplaintCategory::Other,
    }
}

fn parse_urgency(value: Option<&str>) -> ComplaintUrgency {
    match value {
        Some("low") => ComplaintUrgency::Low,
        Some("high") => ComplaintUrgency::High,
        Some("urgent") => ComplaintUrgency::Urgent,
        // Unstated urgency is medium.
        _ => ComplaintUrgency::Medium,
    }
}

#[async_trait]
impl Tool for CreateComplaintTool {
    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: "create_complaint",
            description: "Crea un reclamo o ticket de soporte técnico para el cliente. Úsalo \
                          cuando el usuario reporte problemas de mantenimiento, desperfectos o \
                          quejas sobre la propiedad.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "description": {
                        "type": "string",
                        "description": "Descripción detallada del problema que reporta el usuario."
                    },
                    "category": {
                        "type": "string",
                        "enum": ["plumbing", "electric", "heating", "cleaning", "security", "other"],
                        "description": "Categoría del problema."
                    },
                    "urgency": {
                        "type": "string",
                        "enum": ["low", "medium", "high", "urgent"],
                        "description": "Urgencia del reclamo. Si no se especifica, asumir medium."
                    },
                    "propertyId": {
                        "type": "string",
                        "description": "ID de la propiedad afectada, si se conoce."
                    }
                },
                "required": ["description", "category"]
            }),
        }
    }

    async fn execute(&self, args: &Value, ctx: &ToolContext) -> Value {
        let Some(client_id) = ctx.core_client_id.as_deref() else {
            return auth_required_value(
                "Para crear un reclamo necesitas estar registrado. Por favor, verifica tu \
                 identidad primero proporcionando tu DNI/CUIT.",
            );
        };

        let Some(description) = args["description"].as_str().filter(|d| !d.trim().is_empty())
        else {
            return error_value("falta la descripción del reclamo");
        };

        let request = ComplaintRequest {
            client_id: client_id.to_string(),
            property_id: args["propertyId"].as_str().map(str::to_string),
            category: parse_category(args["category"].as_str()),
            description: description.to_string(),
            urgency: parse_urgency(args["urgency"].as_str()),
            whatsapp_jid: ctx.jid.clone(),
        };

        match self.gateway.create_complaint(request).await {
            Ok(receipt) => {
                let short_ref: String = receipt
                    .ticket_id
                    .chars()
                    .rev()
                    .take(6)
                    .collect::<Vec<_>>()
                    .into_iter()
                    .rev()
                    .collect();
                json!({
                    "status": "created",
                    "ticketId": receipt.ticket_id,
                    "message": format!(
                        "✅ {}\n\nTu reclamo ha sido registrado con el número **#{short_ref}**.\n\nNuestro equipo lo revisará pronto y te contactaremos para coordinar la solución.",
                        receipt.message
                    ),
                })
            }
            Err(error) => backend_error_value(&error),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use portero_gateway::SimulatedCoreGateway;

    use super::CreateComplaintTool;
    use crate::tools::{Tool, ToolContext};

    fn linked_ctx() -> ToolContext {
        ToolContext {
            jid: "5492804503151@s.whatsapp.net".to_string(),
            core_client_id: Some("client_001".to_string()),
        }
    }

    #[tokio::test]
    async fn guest_cannot_open_a_ticket() {
        let tool = CreateComplaintTool::new(Arc::new(SimulatedCoreGateway::new()));
        let ctx = ToolContext { jid: "g@s.whatsapp.net".to_string(), core_client_id: None };

        let result = tool
            .execute(&json!({"description": "gotera", "category": "plumbing"}), &ctx)
            .await;
        assert_eq!(result["requires_auth"], json!(true));
    }

    #[tokio::test]
    async fn ticket_is_created_with_reference() {
        let tool = CreateComplaintTool::new(Arc::new(SimulatedCoreGateway::new()));

        let result = tool
            .execute(
                &json!({"description": "gotera en el baño", "category": "plumbing", "urgency": "high"}),
                &linked_ctx(),
            )
            .await;

        assert_eq!(result["status"], json!("created"));
        assert!(result["ticketId"].as_str().unwrap_or("").starts_with("TKT-"));
    }

    #[tokio::test]
    async fn missing_description_is_rejected_locally() {
        let tool = CreateComplaintTool::new(Arc::new(SimulatedCoreGateway::new()));

        let result = tool.execute(&json!({"category": "other"}), &linked_ctx()).await;
        assert_eq!(result["error"], json!(true));
    }
}
