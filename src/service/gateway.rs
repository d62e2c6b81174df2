use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;
use tracing::{debug, warn};

use crate::clients::gemini::LanguageModel;
use crate::context::RequestContext;
use crate::error::InterpretError;
use crate::models::intent::{AssistantResponse, Intent, IntentKind, ModelAction, ModelReply};
use crate::service::prompts;

/// Structured outcome of one model round trip: the conversational reply
/// plus the recognized calendar action, if any.
#[derive(Debug)]
pub struct Interpretation {
    pub message: String,
    pub intent: Option<Intent>,
    pub suggestions: Vec<String>,
}

/// Front door to the language model. Owns prompt construction and all
/// defensive parsing of the model's output, so model non-determinism and
/// format drift never leak past this type.
pub struct AssistantGateway {
    model: Arc<dyn LanguageModel>,
    fallback_timezone: Tz,
}

impl AssistantGateway {
    pub fn new(model: Arc<dyn LanguageModel>, fallback_timezone: Tz) -> Self {
        Self {
            model,
            fallback_timezone,
        }
    }

    pub fn resolved_timezone(&self, ctx: &RequestContext) -> Tz {
        ctx.timezone.unwrap_or(self.fallback_timezone)
    }

    pub async fn interpret(
        &self,
        message: &str,
        ctx: &RequestContext,
    ) -> Result<Interpretation, InterpretError> {
        let tz = self.resolved_timezone(ctx);
        let now_local = Utc::now().with_timezone(&tz);
        let prompt = prompts::chat_prompt(now_local, tz, message);

        let raw = self
            .model
            .generate(&prompt)
            .await
            .map_err(|err| InterpretError::ModelUnavailable(err.to_string()))?;
        debug!(request_id = %ctx.request_id, "model replied, parsing");

        let reply = extract_reply(&raw)?;
        let intent = match reply.calendar_action {
            Some(action) => Some(intent_from_action(action)?),
            None => None,
        };

        Ok(Interpretation {
            message: reply
                .message
                .unwrap_or_else(|| "I'm here to help with your calendar needs.".to_string()),
            intent,
            suggestions: reply
                .suggestions
                .unwrap_or_else(AssistantResponse::default_suggestions),
        })
    }

    /// Like `interpret`, but never fails: any model or parse problem
    /// becomes the generic clarification response.
    pub async fn respond(&self, message: &str, ctx: &RequestContext) -> AssistantResponse {
        match self.interpret(message, ctx).await {
            Ok(interpretation) => AssistantResponse {
                message: interpretation.message,
                calendar_actions: interpretation
                    .intent
                    .as_ref()
                    .and_then(|intent| serde_json::to_value(intent).ok()),
                suggestions: interpretation.suggestions,
            },
            Err(err) => {
                warn!(request_id = %ctx.request_id, error = %err, "interpretation failed, falling back");
                AssistantResponse::fallback()
            }
        }
    }
}

/// Parse the model's text output. The model is told to reply with bare
/// JSON, but it routinely wraps it in prose, so on a failed direct parse we
/// take the substring between the first `{` and the last `}`.
fn extract_reply(raw: &str) -> Result<ModelReply, InterpretError> {
    let trimmed = raw.trim();
    if let Ok(reply) = serde_json::from_str::<ModelReply>(trimmed) {
        return Ok(reply);
    }

    let start = trimmed.find('{').ok_or(InterpretError::NoJsonFound)?;
    let end = trimmed.rfind('}').ok_or(InterpretError::NoJsonFound)?;
    if end < start {
        return Err(InterpretError::NoJsonFound);
    }
    serde_json::from_str(&trimmed[start..=end]).map_err(|_| InterpretError::NoJsonFound)
}

fn intent_from_action(action: ModelAction) -> Result<Intent, InterpretError> {
    let kind = IntentKind::from_tag(&action.action_type);

    // Reminder-family actions are only actionable with a full field set;
    // an incomplete reply is an interpretation failure, not a handler job.
    if matches!(kind, IntentKind::Reminder | IntentKind::Recurring) {
        for field in ["title", "time", "date"] {
            let present = action
                .details
                .get(field)
                .and_then(|value| value.as_str())
                .is_some_and(|value| !value.trim().is_empty());
            if !present {
                return Err(InterpretError::MissingFields(field));
            }
        }
    }

    Ok(Intent {
        kind,
        details: action.details,
    })
}
