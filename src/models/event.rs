use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// A contiguous stretch of time inside a search window. Produced only by the
/// free-slot calculator; `start < end` always holds for emitted slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub is_available: bool,
}

impl TimeSlot {
    pub fn available(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        debug_assert!(start < end, "time slot must have positive duration");
        Self {
            start,
            end,
            is_available: true,
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }
}

/// A committed period from the provider's free/busy response. Ephemeral:
/// lives only for the duration of one slot search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusyInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderMethod {
    Popup,
    Email,
}

impl ReminderMethod {
    /// Lead time applied when the user did not give one explicitly.
    pub fn default_minutes(self) -> u32 {
        match self {
            ReminderMethod::Popup => 15,
            ReminderMethod::Email => 60,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "popup" => Some(ReminderMethod::Popup),
            "email" => Some(ReminderMethod::Email),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderOverride {
    pub method: ReminderMethod,
    pub minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventReminders {
    pub use_default: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<ReminderOverride>,
}

impl EventReminders {
    pub fn single(method: ReminderMethod, minutes: u32) -> Self {
        Self {
            use_default: false,
            overrides: vec![ReminderOverride { method, minutes }],
        }
    }
}

impl Default for EventReminders {
    fn default() -> Self {
        Self {
            use_default: true,
            overrides: Vec::new(),
        }
    }
}

/// Event start/end in the provider's wire format. Timed events carry an
/// RFC 3339 `dateTime` plus the IANA timezone to display it in; all-day
/// events carry only a calendar `date`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventDateTime {
    pub fn localized(moment: DateTime<Tz>) -> Self {
        Self {
            date_time: Some(moment.to_rfc3339()),
            date: None,
            time_zone: Some(moment.timezone().name().to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAttendee {
    pub email: String,
}

/// The provider event payload. Created by a handler, sent to the calendar
/// backend, and owned by the provider from then on; we keep no durable copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start: EventDateTime,
    pub end: EventDateTime,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attendees: Vec<EventAttendee>,
    #[serde(default)]
    pub reminders: EventReminders,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recurrence: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_link: Option<String>,
}

impl CalendarEvent {
    pub fn new(summary: String, start: EventDateTime, end: EventDateTime) -> Self {
        Self {
            id: None,
            summary,
            description: None,
            start,
            end,
            attendees: Vec::new(),
            reminders: EventReminders::default(),
            location: None,
            recurrence: Vec::new(),
            html_link: None,
        }
    }
}
