//! The bounded tool-calling loop. One inbound text becomes one model
//! session; tool calls are executed in order, their results batched
//! back, and after a fixed number of rounds the loop is cut with a
//! fallback reply instead of looping forever.

use std::sync::Arc;

use thiserror::Error;

use portero_core::CallerIdentity;
use portero_db::repositories::RepositoryError;

use crate::context::ContextBuilder;
use crate::llm::{ChatModel, ModelError, ToolResultPart};
use crate::tools::{ToolContext, ToolRegistry, VERIFY_OTP_NAME};

pub const MAX_TOOL_ROUNDS: usize = 5;

/// Fixed reply when the whole exchange fails.
pub const FALLBACK_REPLY: &str =
    "Disculpa, tuve un problema técnico procesando tu solicitud. ¿Podrías intentarlo de nuevo?";

/// Reply when the model is still asking for tools at the round limit.
pub const RETRY_PROMPT: &str =
    "No pude completar tu consulta en este momento. ¿Podrías reformularla?";

#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("history unavailable: {0}")]
    History(#[from] RepositoryError),
}

#[derive(Clone, Debug)]
pub struct RespondRequest {
    pub jid: String,
    pub text: String,
    pub identity: CallerIdentity,
}

/// Identity proven during this exchange. The caller persists the link;
/// the orchestrator itself never writes chat state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedLink {
    pub client_id: String,
    pub client_name: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AgentReply {
    pub text: String,
    pub verified_link: Option<VerifiedLink>,
}

pub struct Orchestrator {
    model: Arc<dyn ChatModel>,
    registry: Arc<ToolRegistry>,
    context: ContextBuilder,
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn ChatModel>,
        registry: Arc<ToolRegistry>,
        context: ContextBuilder,
    ) -> Self {
        Self { model, registry, context }
    }

    pub async fn respond(
        &self,
        request: &RespondRequest,
    ) -> Result<AgentReply, OrchestrationError> {
        let prompt = self.context.build(&request.jid, &request.identity).await?;
        let declarations = self.registry.declarations();

        let mut session =
            self.model.begin(&prompt.directive, &prompt.transcript, &declarations).await?;

        let tool_ctx = ToolContext {
            jid: request.jid.clone(),
            core_client_id: request.identity.client_id().map(str::to_string),
        };

        let mut reply = session.send_text(&request.text).await?;
        let mut verified_link = None;
        let mut rounds = 0;

        while reply.wants_tools() && rounds < MAX_TOOL_ROUNDS {
            rounds += 1;

            let mut results = Vec::with_capacity(reply.tool_calls.len());
            for call in &reply.tool_calls {
                tracing::info!(
                    event_name = "agent.tool_call",
                    tool = %call.name,
                    jid = %request.jid,
                    round = rounds,
                    "executing tool"
                );

                let response = self.registry.execute(&call.name, &call.args, &tool_ctx).await;

                if call.name == VERIFY_OTP_NAME && response["status"] == "verified" {
                    if let Some(client_id) = response["clientId"].as_str() {
                        verified_link = Some(VerifiedLink {
                            client_id: client_id.to_string(),
                            client_name: response["clientName"].as_str().map(str::to_string),
                        });
                    }
                }

                results.push(ToolResultPart { name: call.name.clone(), response });
            }

            reply = session.send_tool_results(results).await?;
        }

        // Text accompanying unresolved tool calls at the limit is not
        // trustworthy; cut it.
        let text = if reply.wants_tools() {
            tracing::warn!(
                event_name = "agent.round_limit",
                jid = %request.jid,
                "model still requesting tools at round limit"
            );
            RETRY_PROMPT.to_string()
        } else {
            match reply.text {
                Some(text) if !text.trim().is_empty() => text,
                _ => {
                    tracing::warn!(
                        event_name = "agent.empty_reply",
                        jid = %request.jid,
                        "model produced no final text"
                    );
                    RETRY_PROMPT.to_string()
                }
            }
        };

        Ok(AgentReply { text, verified_link })
    }

    /// Failure-absorbing wrapper: any orchestration fault becomes the
    /// fixed apology so the caller always has something to send.
    pub async fn reply_or_apology(&self, request: &RespondRequest) -> AgentReply {
        match self.respond(request).await {
            Ok(reply) => reply,
            Err(error) => {
                tracing::error!(
                    event_name = "agent.respond_failed",
                    jid = %request.jid,
                    error = %error,
                    "agent exchange failed, sending apology"
                );
                AgentReply { text: FALLBACK_REPLY.to_string(), verified_link: None }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use portero_core::CallerIdentity;
    use portero_db::repositories::InMemoryMessageRepository;
    use portero_gateway::{CoreGateway, SimulatedCoreGateway};

    use super::{
        Orchestrator, RespondRequest, FALLBACK_REPLY, MAX_TOOL_ROUNDS, RETRY_PROMPT,
    };
    use crate::context::ContextBuilder;
    use crate::llm::{ModelReply, ScriptedModel};
    use crate::tools::standard_registry;

    fn orchestrator_with(model: ScriptedModel) -> Orchestrator {
        let gateway = Arc::new(SimulatedCoreGateway::new());
        Orchestrator::new(
            Arc::new(model),
            Arc::new(standard_registry(gateway)),
            ContextBuilder::new(Arc::new(InMemoryMessageRepository::new())),
        )
    }

    fn guest_request(text: &str) -> RespondRequest {
        RespondRequest {
            jid: "5492800000100@s.whatsapp.net".to_string(),
            text: text.to_string(),
            identity: CallerIdentity::Guest,
        }
    }

    #[tokio::test]
    async fn plain_text_reply_passes_through() {
        let model = ScriptedModel::new(vec![ModelReply::text_reply("¡Hola! ¿En qué ayudo?")]);
        let orchestrator = orchestrator_with(model);

        let reply = orchestrator.respond(&guest_request("hola")).await.expect("respond");
        assert_eq!(reply.text, "¡Hola! ¿En qué ayudo?");
        assert!(reply.verified_link.is_none());
    }

    #[tokio::test]
    async fn tool_round_feeds_results_back_to_the_model() {
        let model = ScriptedModel::new(vec![
            ModelReply::tool_call("get_available_cities", json!({})),
            ModelReply::text_reply("Tenemos propiedades en Rawson y Playa Unión."),
        ]);
        let orchestrator = orchestrator_with(model.clone());

        let reply =
            orchestrator.respond(&guest_request("¿dónde tienen?")).await.expect("respond");
        assert!(reply.text.contains("Rawson"));

        let batches = model.received_tool_results();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0][0].name, "get_available_cities");
        assert_eq!(batches[0][0].response["success"], json!(true));
    }

    #[tokio::test]
    async fn guest_balance_query_yields_auth_marker_for_the_model() {
        let model = ScriptedModel::new(vec![
            ModelReply::tool_call("check_account_status", json!({})),
            ModelReply::text_reply("Necesito validar tu identidad primero."),
        ]);
        let orchestrator = orchestrator_with(model.clone());

        orchestrator.respond(&guest_request("¿cuánto debo?")).await.expect("respond");

        let batches = model.received_tool_results();
        assert_eq!(batches[0][0].response["requires_auth"], json!(true));
    }

    #[tokio::test]
    async fn loop_is_cut_at_the_round_limit() {
        let mut replies = Vec::new();
        // One initial call plus one per round, always asking for more.
        for _ in 0..=MAX_TOOL_ROUNDS {
            replies.push(ModelReply::tool_call("get_available_cities", json!({})));
        }
        let model = ScriptedModel::new(replies);
        let orchestrator = orchestrator_with(model.clone());

        let reply = orchestrator.respond(&guest_request("bucle")).await.expect("respond");
        assert_eq!(reply.text, RETRY_PROMPT);
        assert_eq!(model.received_tool_results().len(), MAX_TOOL_ROUNDS);
    }

    #[tokio::test]
    async fn verified_otp_surfaces_the_link_without_touching_chat_state() {
        let jid = "5492800000101@s.whatsapp.net";
        let gateway = Arc::new(SimulatedCoreGateway::new());
        // Seed an open verification session for this caller.
        gateway.validate_identity("12345678", jid).await.expect("validate");

        let model = ScriptedModel::new(vec![
            ModelReply::tool_call("verify_otp", json!({"otp": "123456"})),
            ModelReply::text_reply("¡Listo, Juan! Tu identidad está verificada."),
        ]);
        let orchestrator = Orchestrator::new(
            Arc::new(model),
            Arc::new(standard_registry(gateway)),
            ContextBuilder::new(Arc::new(InMemoryMessageRepository::new())),
        );

        let request = RespondRequest {
            jid: jid.to_string(),
            text: "123456".to_string(),
            identity: CallerIdentity::Guest,
        };
        let reply = orchestrator.respond(&request).await.expect("respond");

        let link = reply.verified_link.expect("verified link");
        assert_eq!(link.client_id, "client_001");
        assert_eq!(link.client_name.as_deref(), Some("Juan Pérez"));
    }

    #[tokio::test]
    async fn model_fault_becomes_the_fixed_apology() {
        // Empty script: the first send_text already fails.
        let model = ScriptedModel::new(Vec::new());
        let orchestrator = orchestrator_with(model);

        let reply = orchestrator.reply_or_apology(&guest_request("hola")).await;
        assert_eq!(reply.text, FALLBACK_REPLY);
        assert!(reply.verified_link.is_none());
    }

    #[tokio::test]
    async fn unknown_tool_request_still_completes_the_exchange() {
        let model = ScriptedModel::new(vec![
            ModelReply::tool_call("imaginary_tool", json!({})),
            ModelReply::text_reply("Déjame consultarlo con el asesor a cargo."),
        ]);
        let orchestrator = orchestrator_with(model.clone());

        let reply = orchestrator.respond(&guest_request("???")).await.expect("respond");
        assert!(reply.text.contains("asesor"));

        let batches = model.received_tool_results();
        assert_eq!(batches[0][0].response["error"], json!(true));
    }

    #[tokio::test]
    async fn empty_final_text_is_replaced_with_retry_prompt() {
        let model = ScriptedModel::new(vec![ModelReply::default()]);
        let orchestrator = orchestrator_with(model);

        let reply = orchestrator.respond(&guest_request("hola")).await.expect("respond");
        assert_eq!(reply.text, RETRY_PROMPT);
    }
}
