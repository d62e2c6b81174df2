use std::sync::Arc;

use async_trait::async_trait;

use timebridge::clients::gemini::LanguageModel;
use timebridge::context::RequestContext;
use timebridge::error::{InterpretError, ModelCallError};
use timebridge::models::intent::IntentKind;
use timebridge::service::gateway::AssistantGateway;

struct FakeModel {
    response: Result<String, String>,
}

impl FakeModel {
    fn replying(body: &str) -> Self {
        Self {
            response: Ok(body.to_string()),
        }
    }

    fn failing(error: &str) -> Self {
        Self {
            response: Err(error.to_string()),
        }
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn generate(&self, _prompt: &str) -> Result<String, ModelCallError> {
        match &self.response {
            Ok(body) => Ok(body.clone()),
            Err(err) => Err(ModelCallError::Http(err.clone())),
        }
    }
}

fn gateway(model: FakeModel) -> AssistantGateway {
    AssistantGateway::new(Arc::new(model), chrono_tz::UTC)
}

#[tokio::test]
async fn json_surrounded_by_prose_still_parses() {
    let gateway = gateway(FakeModel::replying(
        "Sure! {\"message\": \"ok\", \"calendar_action\": null} Thanks!",
    ));

    let interpretation = gateway
        .interpret("hello", &RequestContext::new())
        .await
        .expect("prose-wrapped JSON should parse");

    assert_eq!(interpretation.message, "ok");
    assert!(interpretation.intent.is_none());
}

#[tokio::test]
async fn reminder_action_with_full_details_becomes_an_intent() {
    let gateway = gateway(FakeModel::replying(
        r#"{
            "message": "Setting that up",
            "calendar_action": {
                "type": "reminder",
                "details": {"title": "call mom", "date": "2026-03-02", "time": "16:00"}
            },
            "suggestions": ["Anything else?"]
        }"#,
    ));

    let interpretation = gateway
        .interpret("remind me to call mom", &RequestContext::new())
        .await
        .expect("complete reminder should parse");

    let intent = interpretation.intent.expect("intent expected");
    assert_eq!(intent.kind, IntentKind::Reminder);
    assert_eq!(
        intent.details.get("title").and_then(|v| v.as_str()),
        Some("call mom")
    );
    assert_eq!(interpretation.suggestions, vec!["Anything else?"]);
}

#[tokio::test]
async fn reminder_action_missing_a_field_is_an_interpretation_error() {
    let gateway = gateway(FakeModel::replying(
        r#"{"message": "ok", "calendar_action": {"type": "reminder", "details": {"title": "call mom", "date": "2026-03-02"}}}"#,
    ));

    let err = gateway
        .interpret("remind me", &RequestContext::new())
        .await
        .unwrap_err();
    assert!(matches!(err, InterpretError::MissingFields("time")));
}

#[tokio::test]
async fn respond_recovers_from_unparsable_output() {
    let gateway = gateway(FakeModel::replying("I am not JSON at all."));

    let response = gateway.respond("hello", &RequestContext::new()).await;
    assert!(response.message.contains("having trouble understanding"));
    assert!(response.calendar_actions.is_none());
    assert!(!response.suggestions.is_empty());
}

#[tokio::test]
async fn respond_recovers_from_model_outage() {
    let gateway = gateway(FakeModel::failing("connection refused"));

    let response = gateway.respond("hello", &RequestContext::new()).await;
    assert!(response.message.contains("having trouble understanding"));
    assert!(!response.suggestions.is_empty());
}

#[tokio::test]
async fn unknown_action_tags_are_kept_as_unknown_intents() {
    let gateway = gateway(FakeModel::replying(
        r#"{"message": "ok", "calendar_action": {"type": "time_travel", "details": {}}}"#,
    ));

    let interpretation = gateway
        .interpret("send me to 1985", &RequestContext::new())
        .await
        .expect("unknown tags are not errors");
    assert_eq!(
        interpretation.intent.expect("intent expected").kind,
        IntentKind::Unknown
    );
}
