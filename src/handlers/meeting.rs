use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::clients::google_calendar::CalendarApi;
use crate::context::RequestContext;
use crate::error::CalendarError;
use crate::models::event::{BusyInterval, TimeSlot};
use crate::service::freebusy::find_free_slots;

use super::{
    classify_provider_error, localize, resolve_timezone, wall_clock_time, ActionHandler,
    HandlerResult,
};

/// How far ahead the slot search looks.
const SEARCH_HORIZON_DAYS: i64 = 14;
/// System-wide cap on proposed slots, not per day.
const MAX_PROPOSED_SLOTS: usize = 5;

#[derive(Debug, Deserialize)]
pub struct TimeRange {
    #[serde(deserialize_with = "wall_clock_time")]
    pub start: NaiveTime,
    #[serde(deserialize_with = "wall_clock_time")]
    pub end: NaiveTime,
}

#[derive(Debug, Deserialize)]
pub struct MeetingParams {
    pub attendees: Vec<String>,
    pub duration_minutes: i64,
    pub preferred_days: Vec<String>,
    pub time_range: TimeRange,
    #[serde(default)]
    pub timezone: Option<String>,
}

/// Proposes meeting times: queries the attendees' combined free/busy data
/// over a two-week horizon and returns the first few gaps long enough for
/// the requested duration. Does not create the event; the user picks a
/// slot first.
pub struct MeetingHandler {
    calendar: Arc<dyn CalendarApi>,
    fallback_timezone: Tz,
}

impl MeetingHandler {
    pub fn new(calendar: Arc<dyn CalendarApi>, fallback_timezone: Tz) -> Self {
        Self {
            calendar,
            fallback_timezone,
        }
    }

    fn parse_params(params: &Value) -> Option<MeetingParams> {
        let parsed: MeetingParams = serde_json::from_value(params.clone()).ok()?;
        if parsed.attendees.is_empty()
            || parsed.duration_minutes <= 0
            || parsed.preferred_days.is_empty()
        {
            return None;
        }
        if parsed.time_range.start >= parsed.time_range.end {
            return None;
        }
        if let Some(timezone) = &parsed.timezone {
            timezone.parse::<Tz>().ok()?;
        }
        Some(parsed)
    }

    /// Slot search over the fixed horizon, separated from `execute` so the
    /// search window is deterministic under test.
    pub async fn find_slots(
        &self,
        parsed: &MeetingParams,
        now: DateTime<Utc>,
        tz: Tz,
    ) -> Result<Vec<TimeSlot>, CalendarError> {
        let horizon_end = now + Duration::days(SEARCH_HORIZON_DAYS);
        let busy_by_attendee = self
            .calendar
            .free_busy(&parsed.attendees, now, horizon_end)
            .await?;
        let all_busy: Vec<BusyInterval> = busy_by_attendee.into_values().flatten().collect();

        let wanted_days: Vec<String> = parsed
            .preferred_days
            .iter()
            .map(|day| day.to_lowercase())
            .collect();
        let duration = Duration::minutes(parsed.duration_minutes);

        let mut qualifying = Vec::new();
        for offset in 0..=SEARCH_HORIZON_DAYS {
            let date = (now.with_timezone(&tz) + Duration::days(offset)).date_naive();
            let weekday = date.format("%A").to_string().to_lowercase();
            if !wanted_days.contains(&weekday) {
                continue;
            }

            let (Some(day_start), Some(day_end)) = (
                localize(date, parsed.time_range.start, tz),
                localize(date, parsed.time_range.end, tz),
            ) else {
                continue;
            };

            let day_slots = find_free_slots(
                day_start.with_timezone(&Utc),
                day_end.with_timezone(&Utc),
                &all_busy,
            );
            qualifying.extend(
                day_slots
                    .into_iter()
                    .filter(|slot| slot.duration() >= duration),
            );
        }

        qualifying.truncate(MAX_PROPOSED_SLOTS);
        Ok(qualifying)
    }
}

#[async_trait]
impl ActionHandler for MeetingHandler {
    fn validate_params(&self, params: &Value) -> bool {
        match Self::parse_params(params) {
            Some(_) => true,
            None => {
                error!("meeting params rejected");
                false
            }
        }
    }

    async fn execute(&self, params: &Value, ctx: &RequestContext) -> HandlerResult {
        let Some(parsed) = Self::parse_params(params) else {
            return HandlerResult::error(
                "I couldn't search for meeting times: I need attendees, a duration, preferred \
                 days and a daily time range.",
            )
            .with_suggestions(vec![
                "Try: find a 30-minute slot with alice@example.com on Mondays between 09:00 and 17:00"
                    .to_string(),
            ]);
        };

        let Some(tz) = resolve_timezone(parsed.timezone.as_deref(), ctx, self.fallback_timezone)
        else {
            return HandlerResult::error("I didn't recognize that timezone.")
                .with_suggestions(vec!["Use an IANA name like America/New_York".to_string()]);
        };

        match self.find_slots(&parsed, Utc::now(), tz).await {
            Ok(slots) if slots.is_empty() => HandlerResult::success(
                "I couldn't find a gap that works for everyone in the next two weeks.",
            )
            .with_suggestions(vec![
                "Try a shorter duration".to_string(),
                "Allow more weekdays".to_string(),
            ]),
            Ok(slots) => {
                info!(request_id = %ctx.request_id, count = slots.len(), "meeting slots found");
                let listing = slots
                    .iter()
                    .map(|slot| {
                        format!(
                            "- {}",
                            slot.start
                                .with_timezone(&tz)
                                .format("%A, %B %d at %I:%M %p")
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                HandlerResult::success(format!(
                    "Here are {} times that work for everyone:\n{}",
                    slots.len(),
                    listing
                ))
                .with_details(json!({ "available_slots": slots }))
                .with_suggestions(vec!["Pick a slot and I'll send the invite".to_string()])
            }
            Err(err) => {
                error!(request_id = %ctx.request_id, error = %err, "slot search failed");
                self.handle_error(&err)
            }
        }
    }

    fn handle_error(&self, error: &CalendarError) -> HandlerResult {
        classify_provider_error(error, "Failed to find meeting times")
    }
}
