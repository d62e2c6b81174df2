use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::context::RequestContext;
use crate::error::CalendarError;

use super::{classify_provider_error, ActionHandler, HandlerResult};

/// Catch-all for intents the registry has no handler for. Asks a follow-up
/// question instead of surfacing an error; an unrecognized request is a
/// conversation problem, not a failure.
pub struct ClarificationHandler;

#[async_trait]
impl ActionHandler for ClarificationHandler {
    fn validate_params(&self, _params: &Value) -> bool {
        true
    }

    async fn execute(&self, _params: &Value, ctx: &RequestContext) -> HandlerResult {
        debug!(request_id = %ctx.request_id, "unrecognized intent, requesting clarification");
        HandlerResult::success(
            "I'm not sure which calendar action you'd like. Could you tell me a bit more?",
        )
        .needs_clarification()
        .with_suggestions(vec![
            "Set a reminder".to_string(),
            "Schedule a meeting".to_string(),
            "Plan a study schedule".to_string(),
        ])
    }

    fn handle_error(&self, error: &CalendarError) -> HandlerResult {
        classify_provider_error(error, "Something went wrong")
    }
}
