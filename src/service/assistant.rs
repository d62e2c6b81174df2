use tracing::{info, warn};

use crate::context::RequestContext;
use crate::handlers::HandlerRegistry;
use crate::models::intent::AssistantResponse;
use crate::service::gateway::AssistantGateway;

/// End-to-end pipeline for one inbound message: interpret with the model,
/// dispatch the recognized action to its handler, fold the handler result
/// into the user-facing response. Every path ends in a friendly message
/// with suggestions; nothing escapes as an error.
pub struct CalendarAssistant {
    gateway: AssistantGateway,
    registry: HandlerRegistry,
}

impl CalendarAssistant {
    pub fn new(gateway: AssistantGateway, registry: HandlerRegistry) -> Self {
        Self { gateway, registry }
    }

    pub async fn handle_message(&self, text: &str, ctx: &RequestContext) -> AssistantResponse {
        let interpretation = match self.gateway.interpret(text, ctx).await {
            Ok(interpretation) => interpretation,
            Err(err) => {
                warn!(request_id = %ctx.request_id, error = %err, "interpretation failed");
                return AssistantResponse::fallback();
            }
        };

        let Some(intent) = interpretation.intent else {
            // Conversational reply with no calendar action attached.
            return AssistantResponse {
                message: interpretation.message,
                calendar_actions: None,
                suggestions: interpretation.suggestions,
            };
        };

        info!(request_id = %ctx.request_id, kind = ?intent.kind, "dispatching calendar action");
        let result = self.registry.dispatch(&intent, ctx).await;

        let suggestions = if result.suggestions.is_empty() {
            interpretation.suggestions
        } else {
            result.suggestions.clone()
        };

        AssistantResponse {
            message: result.message.clone(),
            calendar_actions: serde_json::to_value(&result).ok(),
            suggestions,
        }
    }
}
