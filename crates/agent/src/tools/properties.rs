use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use portero_gateway::{CoreGateway, Operation, PropertyFilters};

use super::{backend_error_value, error_value, Tool, ToolContext, ToolDeclaration};

const MAX_LISTED: usize = 5;

pub struct SearchPropertiesTool {
    gateway: Arc<dyn CoreGateway>,
}

impl SearchPropertiesTool {
    pub fn new(gateway: Arc<dyn CoreGateway>) -> Self {
        Self { gateway }
    }
}

fn parse_operation(value: Option<&str>) -> Option<Operation> {
    match value {
        Some("rent") => Some(Operation::Rent),
        Some("sale") => Some(Operation::Sale),
        _ => None,
    }
}

#[async_trait]
impl Tool for SearchPropertiesTool {
    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: "search_properties",
            description: "Busca y MUESTRA propiedades inmobiliarias disponibles. Úsalo SIEMPRE \
                          que el usuario pregunte por alquileres o ventas, ANTES de pedir datos \
                          de contacto o agendar reuniones. Debes mostrar las opciones primero.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "operation": {
                        "type": "string",
                        "enum": ["rent", "sale"],
                        "description": "Tipo de operación: \"rent\" para alquiler o \"sale\" para venta."
                    },
                    "type": {
                        "type": "string",
                        "enum": ["apartment", "house", "duplex", "local", "office"],
                        "description": "Tipo de propiedad (opcional)."
                    },
                    "city": {
                        "type": "string",
                        "description": "Ciudad o localidad donde buscar (búsqueda parcial, ej: \"playa\" para \"Playa Unión\")."
                    },
                    "rooms": {
                        "type": "number",
                        "description": "Cantidad mínima de ambientes."
                    },
                    "maxPrice": {
                        "type": "number",
                        "description": "Precio máximo en pesos argentinos."
                    }
                },
                "required": ["operation"]
            }),
        }
    }

    async fn execute(&self, args: &Value, _ctx: &ToolContext) -> Value {
        let Some(operation) = parse_operation(args["operation"].as_str()) else {
            return error_value("falta la operación: \"rent\" o \"sale\"");
        };

        let filters = PropertyFilters {
            operation: Some(operation),
            kind: args["type"].as_str().map(str::to_string),
            city: args["city"].as_str().map(str::to_string),
            rooms: args["rooms"].as_u64().map(|n| n as u32),
            max_price: args["maxPrice"]
                .as_f64()
                .and_then(|n| rust_decimal::Decimal::try_from(n).ok()),
        };

        let listings = match self.gateway.search_properties(filters).await {
            Ok(listings) => listings,
            Err(error) => return backend_error_value(&error),
        };

        if listings.is_empty() {
            let city_suffix = args["city"]
                .as_str()
                .map(|city| format!(" en {city}"))
                .unwrap_or_default();
            let operation_label =
                if operation == Operation::Rent { "alquiler" } else { "venta" };
            return json!({
                "success": false,
                "message": format!(
                    "No encontramos propiedades disponibles para {operation_label}{city_suffix} con los filtros especificados."
                ),
            });
        }

        let shown = listings
            .iter()
            .take(MAX_LISTED)
            .enumerate()
            .map(|(i, prop)| {
                let zone = prop.zone.as_deref().unwrap_or("");
                let rooms = prop
                    .rooms
                    .filter(|r| *r > 0)
                    .map(|r| format!(" - {r} amb."))
                    .unwrap_or_default();
                let surface = prop
                    .surface_m2
                    .map(|m2| format!("\n   📏 {m2}m²"))
                    .unwrap_or_default();
                format!(
                    "{}. **{}**\n   📍 {} - {zone}\n   🏠 {}{rooms}\n   💰 ${} {}{surface}",
                    i + 1,
                    prop.title,
                    prop.address,
                    prop.kind,
                    prop.price,
                    prop.currency,
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let more = if listings.len() > MAX_LISTED {
            format!("\n\n_Mostrando {MAX_LISTED} de {} resultados._", listings.len())
        } else {
            String::new()
        };

        let noun = if listings.len() == 1 { "propiedad disponible" } else { "propiedades disponibles" };
        json!({
            "success": true,
            "count": listings.len(),
            "properties": listings,
            "message": format!("Encontré {} {noun}:\n\n{shown}{more}", listings.len()),
        })
    }
}

pub struct AvailableCitiesTool {
    gateway: Arc<dyn CoreGateway>,
}

impl AvailableCitiesTool {
    pub fn new(gateway: Arc<dyn CoreGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Tool for AvailableCitiesTool {
    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: "get_available_cities",
            description: "Obtiene la lista de ciudades donde hay propiedades disponibles para \
                          alquiler o venta. Úsalo cuando el usuario pregunte en qué ciudades hay \
                          disponibilidad.",
            parameters: json!({ "type": "object", "properties": {} }),
        }
    }

    async fn execute(&self, _args: &Value, _ctx: &ToolContext) -> Value {
        let cities = match self.gateway.available_cities().await {
            Ok(cities) => cities,
            Err(error) => return backend_error_value(&error),
        };

        if cities.is_empty() {
            return json!({
                "success": false,
                "message": "No hay propiedades disponibles en este momento.",
            });
        }

        let listed = cities
            .iter()
            .map(|city| {
                let mut operations = Vec::new();
                if city.rent > 0 {
                    operations.push(format!("{} en alquiler", city.rent));
                }
                if city.sale > 0 {
                    operations.push(format!("{} en venta", city.sale));
                }
                format!("• **{}**: {}", city.city, operations.join(" y "))
            })
            .collect::<Vec<_>>()
            .join("\n");

        json!({
            "success": true,
            "cities": cities,
            "message": format!(
                "Tenemos propiedades disponibles en las siguientes ciudades:\n\n{listed}"
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use portero_gateway::SimulatedCoreGateway;

    use super::{AvailableCitiesTool, SearchPropertiesTool};
    use crate::tools::{Tool, ToolContext};

    fn ctx() -> ToolContext {
        ToolContext { jid: "p@s.whatsapp.net".to_string(), core_client_id: None }
    }

    #[tokio::test]
    async fn search_lists_matches_with_summary() {
        let tool = SearchPropertiesTool::new(Arc::new(SimulatedCoreGateway::new()));
        let result = tool.execute(&json!({"operation": "rent"}), &ctx()).await;

        assert_eq!(result["success"], json!(true));
        assert_eq!(result["count"], json!(2));
        assert!(result["message"].as_str().unwrap_or("").contains("Palermo"));
    }

    #[tokio::test]
    async fn empty_search_reports_the_city() {
        let tool = SearchPropertiesTool::new(Arc::new(SimulatedCoreGateway::new()));
        let result = tool
            .execute(&json!({"operation": "rent", "city": "Ushuaia"}), &ctx())
            .await;

        assert_eq!(result["success"], json!(false));
        assert!(result["message"].as_str().unwrap_or("").contains("Ushuaia"));
    }

    #[tokio::test]
    async fn missing_operation_is_rejected() {
        let tool = SearchPropertiesTool::new(Arc::new(SimulatedCoreGateway::new()));
        let result = tool.execute(&json!({}), &ctx()).await;
        assert_eq!(result["error"], json!(true));
    }

    #[tokio::test]
    async fn cities_are_listed_with_availability() {
        let tool = AvailableCitiesTool::new(Arc::new(SimulatedCoreGateway::new()));
        let result = tool.execute(&json!({}), &ctx()).await;

        assert_eq!(result["success"], json!(true));
        let message = result["message"].as_str().unwrap_or("");
        assert!(message.contains("Rawson"));
        assert!(message.contains("6 en alquiler"));
    }
}
