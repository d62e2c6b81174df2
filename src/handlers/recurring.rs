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

/// The enumerated repeat patterns we support. Arbitrary RRULEs are out of
/// scope; anything else the model suggests fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "daily" => Some(Frequency::Daily),
            "weekly" => Some(Frequency::Weekly),
            "monthly" => Some(Frequency::Monthly),
            "yearly" => Some(Frequency::Yearly),
            _ => None,
        }
    }

    fn rrule(self) -> &'static str {
        match self {
            Frequency::Daily => "RRULE:FREQ=DAILY",
            Frequency::Weekly => "RRULE:FREQ=WEEKLY",
            Frequency::Monthly => "RRULE:FREQ=MONTHLY",
            Frequency::Yearly => "RRULE:FREQ=YEARLY",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Frequency::Daily => "day",
            Frequency::Weekly => "week",
            Frequency::Monthly => "month",
            Frequency::Yearly => "year",
        }
    }
}

#[derive(Debug, Deserialize)]
struct RecurringParams {
    title: String,
    date: NaiveDate,
    #[serde(deserialize_with = "wall_clock_time")]
    time: NaiveTime,
    frequency: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    timezone: Option<String>,
}

/// Creates a repeating reminder (birthdays, weekly check-ins) through the
/// same create-and-verify protocol as one-off reminders.
pub struct RecurringHandler {
    calendar: Arc<dyn CalendarApi>,
    retry: RetryPolicy,
    fallback_timezone: Tz,
}

impl RecurringHandler {
    pub fn new(calendar: Arc<dyn CalendarApi>, retry: RetryPolicy, fallback_timezone: Tz) -> Self {
        Self {
            calendar,
            retry,
            fallback_timezone,
        }
    }

    fn parse_params(params: &Value) -> Option<(RecurringParams, Frequency)> {
        let parsed: RecurringParams = serde_json::from_value(params.clone()).ok()?;
        let frequency = Frequency::parse(&parsed.frequency)?;
        if let Some(timezone) = &parsed.timezone {
            timezone.parse::<Tz>().ok()?;
        }
        Some((parsed, frequency))
    }
}

#[async_trait]
impl ActionHandler for RecurringHandler {
    fn validate_params(&self, params: &Value) -> bool {
        match Self::parse_params(params) {
            Some(_) => true,
            None => {
                error!("recurring params rejected");
                false
            }
        }
    }

    async fn execute(&self, params: &Value, ctx: &RequestContext) -> HandlerResult {
        let Some((parsed, frequency)) = Self::parse_params(params) else {
            return HandlerResult::error(
                "I couldn't set that up: recurring reminders need a title, date, time and a \
                 frequency of daily, weekly, monthly or yearly.",
            )
            .with_suggestions(vec![
                "Try: remind me about standup every weekday at 09:25".to_string()
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

        let end_local = start_local + Duration::minutes(1);
        let mut event = CalendarEvent::new(
            parsed.title.clone(),
            EventDateTime::localized(start_local),
            EventDateTime::localized(end_local),
        );
        event.description = Some(
            parsed
                .description
                .unwrap_or_else(|| "Recurring reminder created by TimeBridge".to_string()),
        );
        event.reminders = EventReminders::single(ReminderMethod::Popup, 15);
        event.recurrence = vec![frequency.rrule().to_string()];

        match create_and_verify(self.calendar.as_ref(), &self.retry, ctx, &event).await {
            Ok(created) => {
                info!(request_id = %ctx.request_id, "recurring reminder created and verified");
                HandlerResult::success(format!(
                    "Recurring reminder set: \"{}\" every {} starting {}",
                    parsed.title,
                    frequency.label(),
                    start_local.format("%B %d, %Y at %I:%M %p"),
                ))
                .with_event(created)
                .verified()
                .with_suggestions(vec!["List my upcoming reminders".to_string()])
            }
            Err(err) => {
                error!(request_id = %ctx.request_id, error = %err, "failed to create recurring reminder");
                self.handle_error(&err)
            }
        }
    }

    fn handle_error(&self, error: &CalendarError) -> HandlerResult {
        classify_provider_error(error, "Failed to set recurring reminder")
    }
}
