use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex as TokioMutex;

use timebridge::clients::gemini::LanguageModel;
use timebridge::clients::google_calendar::CalendarApi;
use timebridge::context::RequestContext;
use timebridge::error::{CalendarError, ModelCallError};
use timebridge::handlers::HandlerRegistry;
use timebridge::handlers::schedule::ConflictPolicy;
use timebridge::models::event::{BusyInterval, CalendarEvent};
use timebridge::service::assistant::CalendarAssistant;
use timebridge::service::gateway::AssistantGateway;
use timebridge::service::retry::RetryPolicy;

struct ScriptedModel {
    body: String,
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, _prompt: &str) -> Result<String, ModelCallError> {
        Ok(self.body.clone())
    }
}

struct InMemoryCalendar {
    created: TokioMutex<Vec<CalendarEvent>>,
}

#[async_trait]
impl CalendarApi for InMemoryCalendar {
    async fn list_events(
        &self,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, CalendarError> {
        Ok(Vec::new())
    }

    async fn create_event(&self, event: &CalendarEvent) -> Result<CalendarEvent, CalendarError> {
        let mut created = event.clone();
        created.id = Some("evt-1".to_string());
        self.created.lock().await.push(created.clone());
        Ok(created)
    }

    async fn get_event(&self, event_id: &str) -> Result<Option<CalendarEvent>, CalendarError> {
        let created = self.created.lock().await;
        Ok(created
            .iter()
            .find(|event| event.id.as_deref() == Some(event_id))
            .cloned())
    }

    async fn free_busy(
        &self,
        _attendees: &[String],
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<HashMap<String, Vec<BusyInterval>>, CalendarError> {
        Ok(HashMap::new())
    }
}

fn assistant(model_body: &str, calendar: Arc<InMemoryCalendar>) -> CalendarAssistant {
    let gateway = AssistantGateway::new(
        Arc::new(ScriptedModel {
            body: model_body.to_string(),
        }),
        chrono_tz::UTC,
    );
    let registry = HandlerRegistry::with_calendar(
        calendar,
        RetryPolicy::default(),
        ConflictPolicy::Ignore,
        chrono_tz::UTC,
    );
    CalendarAssistant::new(gateway, registry)
}

#[tokio::test]
async fn chat_message_flows_through_to_a_verified_reminder() {
    let calendar = Arc::new(InMemoryCalendar {
        created: TokioMutex::new(Vec::new()),
    });
    let assistant = assistant(
        r#"Here you go: {
            "message": "Setting a reminder to call mom.",
            "calendar_action": {
                "type": "reminder",
                "details": {
                    "title": "call mom",
                    "date": "2026-03-02",
                    "time": "16:00",
                    "timezone": "America/New_York"
                }
            }
        }"#,
        calendar.clone(),
    );

    let response = assistant
        .handle_message("remind me to call mom at 4pm", &RequestContext::new())
        .await;

    assert!(response.message.starts_with("Reminder set for"));
    let actions = response.calendar_actions.expect("handler result expected");
    assert_eq!(actions["status"], "success");
    assert_eq!(actions["verified"], true);
    assert_eq!(calendar.created.lock().await.len(), 1);
}

#[tokio::test]
async fn conversational_reply_passes_through_without_dispatch() {
    let calendar = Arc::new(InMemoryCalendar {
        created: TokioMutex::new(Vec::new()),
    });
    let assistant = assistant(
        r#"{"message": "You have a light week!", "calendar_action": null, "suggestions": ["Plan something"]}"#,
        calendar.clone(),
    );

    let response = assistant
        .handle_message("how does my week look?", &RequestContext::new())
        .await;

    assert_eq!(response.message, "You have a light week!");
    assert!(response.calendar_actions.is_none());
    assert_eq!(response.suggestions, vec!["Plan something"]);
    assert!(calendar.created.lock().await.is_empty());
}

#[tokio::test]
async fn unrecognized_action_asks_for_clarification_instead_of_failing() {
    let calendar = Arc::new(InMemoryCalendar {
        created: TokioMutex::new(Vec::new()),
    });
    let assistant = assistant(
        r#"{"message": "ok", "calendar_action": {"type": "teleport", "details": {}}}"#,
        calendar.clone(),
    );

    let response = assistant
        .handle_message("do something strange", &RequestContext::new())
        .await;

    let actions = response.calendar_actions.expect("clarification result expected");
    assert_eq!(actions["clarification_needed"], true);
    assert_eq!(actions["status"], "success");
    assert!(!response.suggestions.is_empty());
    assert!(calendar.created.lock().await.is_empty());
}

#[tokio::test]
async fn garbled_model_output_yields_the_fallback_response() {
    let calendar = Arc::new(InMemoryCalendar {
        created: TokioMutex::new(Vec::new()),
    });
    let assistant = assistant("no json here, sorry", calendar.clone());

    let response = assistant
        .handle_message("remind me of something", &RequestContext::new())
        .await;

    assert!(response.message.contains("having trouble understanding"));
    assert!(!response.suggestions.is_empty());
    assert!(calendar.created.lock().await.is_empty());
}
