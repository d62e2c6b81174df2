use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveTime};
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info};

use crate::clients::google_calendar::CalendarApi;
use crate::context::RequestContext;
use crate::error::CalendarError;
use crate::models::event::{CalendarEvent, EventDateTime, EventReminders, ReminderMethod};
use crate::service::retry::RetryPolicy;

use super::{
    classify_provider_error, create_and_verify, localize, resolve_timezone, wall_clock_time,
    ActionHandler, HandlerResult,
};

#[derive(Debug, Deserialize)]
struct ReminderParams {
    title: String,
    date: NaiveDate,
    #[serde(deserialize_with = "wall_clock_time")]
    time: NaiveTime,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    timezone: Option<String>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    minutes: Option<u32>,
}

/// Creates a single reminder event: a one-minute marker at the requested
/// wall-clock time, with a popup or email notification ahead of it.
pub struct ReminderHandler {
    calendar: Arc<dyn CalendarApi>,
    retry: RetryPolicy,
    fallback_timezone: Tz,
}

impl ReminderHandler {
    pub fn new(calendar: Arc<dyn CalendarApi>, retry: RetryPolicy, fallback_timezone: Tz) -> Self {
        Self {
            calendar,
            retry,
            fallback_timezone,
        }
    }

    fn parse_params(params: &Value) -> Option<ReminderParams> {
        let parsed: ReminderParams = serde_json::from_value(params.clone()).ok()?;
        if let Some(method) = &parsed.method {
            ReminderMethod::parse(method)?;
        }
        if let Some(timezone) = &parsed.timezone {
            timezone.parse::<Tz>().ok()?;
        }
        Some(parsed)
    }
}

#[async_trait]
impl ActionHandler for ReminderHandler {
    fn validate_params(&self, params: &Value) -> bool {
        match Self::parse_params(params) {
            Some(_) => true,
            None => {
                error!("reminder params rejected: missing fields or malformed date/time");
                false
            }
        }
    }

    async fn execute(&self, params: &Value, ctx: &RequestContext) -> HandlerResult {
        let Some(parsed) = Self::parse_params(params) else {
            return HandlerResult::error(
                "I couldn't set that reminder: I need a title, a date (YYYY-MM-DD) and a \
                 time (24-hour HH:MM).",
            )
            .with_suggestions(vec![
                "Try: remind me to call mom on 2026-03-02 at 16:00".to_string()
            ]);
        };

        let Some(tz) = resolve_timezone(parsed.timezone.as_deref(), ctx, self.fallback_timezone)
        else {
            return HandlerResult::error("I didn't recognize that timezone.")
                .with_suggestions(vec!["Use an IANA name like America/New_York".to_string()]);
        };
        let Some(start_local) = localize(parsed.date, parsed.time, tz) else {
            return HandlerResult::error(
                "That wall-clock time doesn't exist in your timezone on that date.",
            )
            .with_suggestions(vec!["Pick a time outside the DST transition".to_string()]);
        };

        let method = parsed
            .method
            .as_deref()
            .and_then(ReminderMethod::parse)
            .unwrap_or(ReminderMethod::Popup);
        let minutes = parsed.minutes.unwrap_or_else(|| method.default_minutes());

        // A reminder is a zero-duration marker, not a calendar block.
        let end_local = start_local + Duration::minutes(1);
        let mut event = CalendarEvent::new(
            parsed.title.clone(),
            EventDateTime::localized(start_local),
            EventDateTime::localized(end_local),
        );
        event.description = Some(
            parsed
                .description
                .unwrap_or_else(|| "Reminder created by TimeBridge".to_string()),
        );
        event.reminders = EventReminders::single(method, minutes);

        match create_and_verify(self.calendar.as_ref(), &self.retry, ctx, &event).await {
            Ok(created) => {
                info!(request_id = %ctx.request_id, "reminder created and verified");
                HandlerResult::success(format!(
                    "Reminder set for {}",
                    start_local.format("%B %d, %Y at %I:%M %p")
                ))
                .with_event(created)
                .verified()
                .with_suggestions(vec![
                    "Set another reminder".to_string(),
                    "Check your schedule".to_string(),
                ])
            }
            Err(err) => {
                error!(request_id = %ctx.request_id, error = %err, "failed to create reminder");
                self.handle_error(&err)
            }
        }
    }

    fn handle_error(&self, error: &CalendarError) -> HandlerResult {
        classify_provider_error(error, "Failed to set reminder")
    }
}
