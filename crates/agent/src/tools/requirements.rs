use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Tool, ToolContext, ToolDeclaration};

/// Static requirement lists; no backend involved.
pub struct RentalRequirementsTool;

#[async_trait]
impl Tool for RentalRequirementsTool {
    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: "get_rental_requirements",
            description: "Proporciona la lista de requisitos necesarios para alquilar una \
                          propiedad.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "type": {
                        "type": "string",
                        "enum": ["housing", "commercial"],
                        "description": "Tipo de alquiler: housing (vivienda) o commercial (comercial)."
                    }
                },
                "required": ["type"]
            }),
        }
    }

    async fn execute(&self, args: &Value, _ctx: &ToolContext) -> Value {
        if args["type"].as_str() == Some("commercial") {
            return json!({
                "requirements": [
                    "Mes de alquiler por adelantado",
                    "Mes de depósito en garantía",
                    "Garantía propietaria o seguro de caución",
                    "Comisión inmobiliaria (5% del total del contrato)",
                    "Constancia de inscripción en AFIP",
                    "Últimos 3 balances certificados (si es sociedad)",
                ],
                "message": "Para alquileres comerciales solicitamos garantía propietaria o seguro de caución, además de la documentación fiscal correspondiente.",
            });
        }

        json!({
            "requirements": [
                "Mes de alquiler por adelantado",
                "Mes de depósito en garantía",
                "Garantía propietaria o recibos de sueldo (sujeto a aprobación)",
                "Comisión inmobiliaria",
                "DNI del inquilino y garantes",
                "Demostración de ingresos (últimos 3 recibos de sueldo)",
            ],
            "message": "Para vivienda trabajamos con garantía propietaria o recibos de sueldo de terceros que tripliquen el valor del alquiler.",
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::RentalRequirementsTool;
    use crate::tools::{Tool, ToolContext};

    fn ctx() -> ToolContext {
        ToolContext { jid: "r@s.whatsapp.net".to_string(), core_client_id: None }
    }

    #[tokio::test]
    async fn commercial_and_housing_lists_differ() {
        let tool = RentalRequirementsTool;

        let commercial = tool.execute(&json!({"type": "commercial"}), &ctx()).await;
        let housing = tool.execute(&json!({"type": "housing"}), &ctx()).await;

        assert!(commercial["message"].as_str().unwrap_or("").contains("comerciales"));
        assert!(housing["message"].as_str().unwrap_or("").contains("vivienda"));
        assert_ne!(commercial["requirements"], housing["requirements"]);
    }

    #[tokio::test]
    async fn unknown_type_defaults_to_housing() {
        let tool = RentalRequirementsTool;
        let result = tool.execute(&json!({}), &ctx()).await;
        assert!(result["message"].as_str().unwrap_or("").contains("vivienda"));
    }
}
