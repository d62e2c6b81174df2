use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::clients::google_calendar::CalendarApi;
use crate::context::RequestContext;
use crate::error::CalendarError;
use crate::models::event::{CalendarEvent, EventDateTime, EventReminders, ReminderMethod};

use super::{
    classify_provider_error, localize, resolve_timezone, wall_clock_time, ActionHandler,
    HandlerResult,
};

/// Whether study-schedule creation consults the calendar before inserting
/// blocks. The meeting path always checks free/busy; for schedules this is
/// a policy choice, defaulting to the historical no-check behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Insert blocks without looking at existing events.
    Ignore,
    /// Skip any block that overlaps an existing event.
    SkipBusy,
}

impl ConflictPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ignore" => Some(ConflictPolicy::Ignore),
            "skip_busy" => Some(ConflictPolicy::SkipBusy),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ScheduleParams {
    topics: Vec<String>,
    start_date: NaiveDate,
    end_date: NaiveDate,
    daily_hours: i64,
    #[serde(deserialize_with = "wall_clock_time")]
    preferred_time: NaiveTime,
    #[serde(default)]
    excluded_days: Vec<String>,
    #[serde(default)]
    timezone: Option<String>,
}

/// Builds a study schedule by deterministic packing: for every non-excluded
/// day, consecutive same-length blocks starting at the preferred time, one
/// per topic. No backtracking.
pub struct ScheduleHandler {
    calendar: Arc<dyn CalendarApi>,
    conflict_policy: ConflictPolicy,
    fallback_timezone: Tz,
}

impl ScheduleHandler {
    pub fn new(
        calendar: Arc<dyn CalendarApi>,
        conflict_policy: ConflictPolicy,
        fallback_timezone: Tz,
    ) -> Self {
        Self {
            calendar,
            conflict_policy,
            fallback_timezone,
        }
    }

    fn parse_params(params: &Value) -> Option<ScheduleParams> {
        let parsed: ScheduleParams = serde_json::from_value(params.clone()).ok()?;
        if parsed.topics.is_empty() || parsed.daily_hours <= 0 {
            return None;
        }
        if parsed.start_date > parsed.end_date {
            return None;
        }
        if let Some(timezone) = &parsed.timezone {
            timezone.parse::<Tz>().ok()?;
        }
        Some(parsed)
    }

    async fn block_is_free(
        &self,
        start: chrono::DateTime<Tz>,
        end: chrono::DateTime<Tz>,
    ) -> Result<bool, CalendarError> {
        let existing = self
            .calendar
            .list_events(start.with_timezone(&Utc), end.with_timezone(&Utc))
            .await?;
        Ok(existing.is_empty())
    }
}

#[async_trait]
impl ActionHandler for ScheduleHandler {
    fn validate_params(&self, params: &Value) -> bool {
        match Self::parse_params(params) {
            Some(_) => true,
            None => {
                error!("schedule params rejected");
                false
            }
        }
    }

    async fn execute(&self, params: &Value, ctx: &RequestContext) -> HandlerResult {
        let Some(parsed) = Self::parse_params(params) else {
            return HandlerResult::error(
                "I couldn't build that study schedule: I need topics, a date range \
                 (YYYY-MM-DD), daily hours and a preferred start time (HH:MM).",
            )
            .with_suggestions(vec![
                "Try: study algebra and physics 2 hours a day from 2026-03-02 to 2026-03-13 at 18:00"
                    .to_string(),
            ]);
        };

        let Some(tz) = resolve_timezone(parsed.timezone.as_deref(), ctx, self.fallback_timezone)
        else {
            return HandlerResult::error("I didn't recognize that timezone.")
                .with_suggestions(vec!["Use an IANA name like America/New_York".to_string()]);
        };

        let excluded: Vec<String> = parsed
            .excluded_days
            .iter()
            .map(|day| day.to_lowercase())
            .collect();
        let block = Duration::minutes(parsed.daily_hours * 60 / parsed.topics.len() as i64);
        if block.num_minutes() == 0 {
            return HandlerResult::error(
                "That's more topics than the daily hours can fit. Give each topic at least a few minutes."
            )
            .with_suggestions(vec!["Increase daily hours or drop a topic".to_string()]);
        }

        let mut created_events = Vec::new();
        let mut skipped = 0usize;
        let mut date = parsed.start_date;
        while date <= parsed.end_date {
            let weekday = date.format("%A").to_string().to_lowercase();
            if excluded.contains(&weekday) {
                date += Duration::days(1);
                continue;
            }

            let Some(day_anchor) = localize(date, parsed.preferred_time, tz) else {
                date += Duration::days(1);
                continue;
            };

            for (index, topic) in parsed.topics.iter().enumerate() {
                let session_start = day_anchor + block * index as i32;
                let session_end = session_start + block;

                if self.conflict_policy == ConflictPolicy::SkipBusy {
                    match self.block_is_free(session_start, session_end).await {
                        Ok(true) => {}
                        Ok(false) => {
                            debug!(%session_start, topic = %topic, "block conflicts with an existing event, skipping");
                            skipped += 1;
                            continue;
                        }
                        Err(err) => {
                            error!(request_id = %ctx.request_id, error = %err, "conflict check failed");
                            return self.handle_error(&err);
                        }
                    }
                }

                let mut event = CalendarEvent::new(
                    format!("Study: {topic}"),
                    EventDateTime::localized(session_start),
                    EventDateTime::localized(session_end),
                );
                event.description = Some(format!("Study session for {topic}"));
                event.reminders = EventReminders::single(ReminderMethod::Popup, 15);

                match self.calendar.create_event(&event).await {
                    Ok(created) => created_events.push(created),
                    Err(err) => {
                        error!(request_id = %ctx.request_id, error = %err, "failed to create study session");
                        return self.handle_error(&err);
                    }
                }
            }

            date += Duration::days(1);
        }

        info!(
            request_id = %ctx.request_id,
            created = created_events.len(),
            skipped,
            "study schedule created"
        );
        let mut message = format!(
            "Created {} study sessions between {} and {}.",
            created_events.len(),
            parsed.start_date.format("%B %d"),
            parsed.end_date.format("%B %d, %Y"),
        );
        if skipped > 0 {
            message.push_str(&format!(
                " Skipped {skipped} blocks that clashed with existing events."
            ));
        }

        HandlerResult::success(message)
            .with_events(created_events)
            .with_suggestions(vec![
                "Review your schedule for next week".to_string(),
                "Set a reminder before the first session".to_string(),
            ])
    }

    fn handle_error(&self, error: &CalendarError) -> HandlerResult {
        classify_provider_error(error, "Failed to create study schedule")
    }
}
