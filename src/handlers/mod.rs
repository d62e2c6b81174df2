pub mod default;
pub mod meeting;
pub mod recurring;
pub mod reminder;
pub mod schedule;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::clients::google_calendar::CalendarApi;
use crate::context::RequestContext;
use crate::error::CalendarError;
use crate::models::event::CalendarEvent;
use crate::models::intent::{Intent, IntentKind};
use crate::service::retry::RetryPolicy;

use self::default::ClarificationHandler;
use self::meeting::MeetingHandler;
use self::recurring::RecurringHandler;
use self::reminder::ReminderHandler;
use self::schedule::{ConflictPolicy, ScheduleHandler};

pub(crate) const TIME_FORMAT: &str = "%H:%M";

/// Serde helper for the 24-hour wall-clock times handler params carry
/// ("16:00"). The full RFC 3339 time shapes chrono accepts by default are
/// not what the model is instructed to emit.
pub(crate) fn wall_clock_time<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    NaiveTime::parse_from_str(&raw, TIME_FORMAT).map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Success,
    Error,
}

/// What every handler path terminates in. Failures carry a friendly message
/// and at least one actionable suggestion, never a bare error code.
#[derive(Debug, Clone, Serialize)]
pub struct HandlerResult {
    pub status: ResultStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<CalendarEvent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<CalendarEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub verified: bool,
    pub clarification_needed: bool,
    pub suggestions: Vec<String>,
}

impl HandlerResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: ResultStatus::Success,
            message: message.into(),
            event: None,
            events: Vec::new(),
            details: None,
            verified: false,
            clarification_needed: false,
            suggestions: Vec::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ResultStatus::Error,
            ..Self::success(message)
        }
    }

    pub fn with_event(mut self, event: CalendarEvent) -> Self {
        self.event = Some(event);
        self
    }

    pub fn with_events(mut self, events: Vec<CalendarEvent>) -> Self {
        self.events = events;
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn verified(mut self) -> Self {
        self.verified = true;
        self
    }

    pub fn needs_clarification(mut self) -> Self {
        self.clarification_needed = true;
        self
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }
}

/// Contract every calendar action implements. `execute` must validate first
/// and short-circuit on bad input; nothing escapes as a raw error.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    fn validate_params(&self, params: &Value) -> bool;

    async fn execute(&self, params: &Value, ctx: &RequestContext) -> HandlerResult;

    fn handle_error(&self, error: &CalendarError) -> HandlerResult;
}

/// Map a provider failure to the user-facing result. 403 and 401 get
/// specific guidance; everything else gets the handler's generic message
/// with the raw error attached for diagnostics.
pub fn classify_provider_error(error: &CalendarError, generic_message: &str) -> HandlerResult {
    let (message, suggestions) = match error.status() {
        Some(403) => (
            "Calendar access denied. Please check your permissions.".to_string(),
            vec!["Re-connect your calendar account".to_string()],
        ),
        Some(401) => (
            "Authentication failed. Please sign in again.".to_string(),
            vec!["Sign in again to refresh your session".to_string()],
        ),
        _ => (
            generic_message.to_string(),
            vec!["Try again in a moment".to_string()],
        ),
    };

    HandlerResult::error(message)
        .with_details(Value::String(error.to_string()))
        .with_suggestions(suggestions)
}

/// The create-and-verify protocol shared by event-creating handlers: create
/// under the retry policy, then read the event back and confirm the id,
/// also under the policy. A failed read-back is a creation failure, not a
/// separate error class.
pub(crate) async fn create_and_verify(
    calendar: &dyn CalendarApi,
    retry: &RetryPolicy,
    ctx: &RequestContext,
    event: &CalendarEvent,
) -> Result<CalendarEvent, CalendarError> {
    let created = retry
        .run(&ctx.cancel, || calendar.create_event(event))
        .await?;

    let Some(event_id) = created.id.clone() else {
        return Err(CalendarError::Verification(
            "provider returned an event without an id".to_string(),
        ));
    };

    retry
        .run(&ctx.cancel, || {
            let id = event_id.clone();
            async move {
                match calendar.get_event(&id).await? {
                    Some(fetched) if fetched.id.as_deref() == Some(id.as_str()) => Ok(()),
                    Some(_) => Err(CalendarError::Verification(
                        "read-back returned a different event id".to_string(),
                    )),
                    None => Err(CalendarError::Verification(
                        "created event not found on read-back".to_string(),
                    )),
                }
            }
        })
        .await?;

    Ok(created)
}

/// Resolve the timezone for one action: explicit param wins, then the
/// request context, then the configured default.
pub(crate) fn resolve_timezone(
    explicit: Option<&str>,
    ctx: &RequestContext,
    fallback: Tz,
) -> Option<Tz> {
    match explicit {
        Some(name) => name.parse().ok(),
        None => Some(ctx.timezone.unwrap_or(fallback)),
    }
}

/// Localize a wall-clock date + time in `tz` without a detour through UTC.
/// `None` when the wall-clock time does not exist in that zone (DST gap).
pub(crate) fn localize(date: NaiveDate, time: NaiveTime, tz: Tz) -> Option<DateTime<Tz>> {
    tz.from_local_datetime(&date.and_time(time)).earliest()
}

/// Maps recognized intent kinds to their handler. Unknown kinds fall
/// through to the clarification handler, which asks instead of failing.
pub struct HandlerRegistry {
    handlers: HashMap<IntentKind, Arc<dyn ActionHandler>>,
    fallback: Arc<dyn ActionHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            fallback: Arc::new(ClarificationHandler),
        }
    }

    /// Wire the full closed set of handlers against one calendar client.
    pub fn with_calendar(
        calendar: Arc<dyn CalendarApi>,
        retry: RetryPolicy,
        conflict_policy: ConflictPolicy,
        fallback_timezone: Tz,
    ) -> Self {
        let mut registry = Self::new();
        registry.register(
            IntentKind::Reminder,
            Arc::new(ReminderHandler::new(
                calendar.clone(),
                retry,
                fallback_timezone,
            )),
        );
        registry.register(
            IntentKind::Meeting,
            Arc::new(MeetingHandler::new(calendar.clone(), fallback_timezone)),
        );
        registry.register(
            IntentKind::Schedule,
            Arc::new(ScheduleHandler::new(
                calendar.clone(),
                conflict_policy,
                fallback_timezone,
            )),
        );
        registry.register(
            IntentKind::Recurring,
            Arc::new(RecurringHandler::new(calendar, retry, fallback_timezone)),
        );
        registry
    }

    pub fn register(&mut self, kind: IntentKind, handler: Arc<dyn ActionHandler>) {
        self.handlers.insert(kind, handler);
    }

    pub async fn dispatch(&self, intent: &Intent, ctx: &RequestContext) -> HandlerResult {
        let handler = self.handlers.get(&intent.kind).unwrap_or(&self.fallback);
        if !self.handlers.contains_key(&intent.kind) {
            warn!(kind = ?intent.kind, "no handler registered, asking for clarification");
        }
        handler
            .execute(&Value::Object(intent.details.clone()), ctx)
            .await
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
