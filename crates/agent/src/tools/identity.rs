use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use portero_core::{normalize_identity_number, normalize_verification_code};
use portero_gateway::{CodeConfirmation, CoreGateway, IdentityValidation};

use super::{backend_error_value, error_value, Tool, ToolContext, ToolDeclaration};

pub const VERIFY_OTP_NAME: &str = "verify_otp";

/// Starts the account-linking flow from a document number.
pub struct VerifyIdentityTool {
    gateway: Arc<dyn CoreGateway>,
}

impl VerifyIdentityTool {
    pub fn new(gateway: Arc<dyn CoreGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Tool for VerifyIdentityTool {
    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: "verify_identity",
            description: "Inicia el proceso de verificación de identidad. Úsalo SOLO cuando el \
                          usuario proporcione su DNI o CUIT (7 a 11 dígitos). NO LO USES si el \
                          usuario envía un código de 6 dígitos (eso es un código de \
                          verificación).",
            parameters: json!({
                "type": "object",
                "properties": {
                    "dni": {
                        "type": "string",
                        "description": "Número de DNI o CUIT del usuario sin puntos ni guiones. Debe tener entre 7 y 11 dígitos."
                    }
                },
                "required": ["dni"]
            }),
        }
    }

    async fn execute(&self, args: &Value, ctx: &ToolContext) -> Value {
        let Some(raw_dni) = args["dni"].as_str().filter(|d| !d.trim().is_empty()) else {
            return error_value("falta el DNI o CUIT a validar");
        };

        let dni = normalize_identity_number(raw_dni);
        if dni.is_empty() {
            return error_value("el DNI o CUIT no contiene dígitos válidos");
        }

        match self.gateway.validate_identity(&dni, &ctx.jid).await {
            Ok(IdentityValidation::CodeSent { client_id, client_name, masked_email }) => {
                let destination = masked_email.as_deref().unwrap_or("tu email registrado");
                json!({
                    "status": "otp_generated",
                    "action": "wait_otp_verification",
                    "clientId": client_id,
                    "message": format!(
                        "Hemos encontrado tu cuenta a nombre de **{client_name}**.\n\nPara verificar tu identidad, hemos enviado un código de seguridad a tu email registrado (**{destination}**).\n\n📧 Por favor, revisa tu bandeja de entrada (y spam) y respóndeme con el código de 6 dígitos que recibiste."
                    ),
                })
            }
            Ok(IdentityValidation::NotFound) => json!({
                "status": "not_found",
                "message": "No encontramos ningún cliente activo con ese DNI/CUIT. ¿Estás seguro que el número es correcto?",
            }),
            Err(error) => backend_error_value(&error),
        }
    }
}

/// Confirms the verification code and, on success, surfaces the client
/// identity so the caller can be linked.
pub struct VerifyOtpTool {
    gateway: Arc<dyn CoreGateway>,
}

impl VerifyOtpTool {
    pub fn new(gateway: Arc<dyn CoreGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Tool for VerifyOtpTool {
    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: VERIFY_OTP_NAME,
            description: "Verifica el código de seguridad. Úsalo SIEMPRE que el usuario envíe un \
                          número de 6 dígitos, especialmente después de haber solicitado \
                          validación de identidad.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "otp": {
                        "type": "string",
                        "description": "Código de 6 dígitos que el usuario proporcionó."
                    }
                },
                "required": ["otp"]
            }),
        }
    }

    async fn execute(&self, args: &Value, ctx: &ToolContext) -> Value {
        let raw_code = args["otp"].as_str().unwrap_or("");

        // Anything that does not normalize to exactly six digits is
        // rejected before touching the backend.
        let Some(code) = normalize_verification_code(raw_code) else {
            return error_value(
                "El código debe tener exactamente 6 dígitos. Por favor, verifica e intenta \
                 nuevamente.",
            );
        };

        match self.gateway.confirm_verification_code(&code, &ctx.jid).await {
            Ok(CodeConfirmation::Verified { client_id, client_name }) => json!({
                "status": "verified",
                "clientId": client_id,
                "clientName": client_name,
                "message": format!(
                    "¡Perfecto, {client_name}! ✅\n\nTu identidad ha sido verificada exitosamente. Ahora puedes consultar tu saldo, crear reclamos y acceder a toda la información de tu cuenta.\n\n¿En qué puedo ayudarte hoy?"
                ),
            }),
            Ok(CodeConfirmation::Invalid { message }) => error_value(message),
            Err(error) => backend_error_value(&error),
        }
    }
}
