use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use serde_json::json;
use tokio::sync::Mutex as TokioMutex;
use tokio::time::Instant;

use timebridge::clients::google_calendar::CalendarApi;
use timebridge::context::RequestContext;
use timebridge::error::CalendarError;
use timebridge::handlers::reminder::ReminderHandler;
use timebridge::handlers::{ActionHandler, ResultStatus};
use timebridge::models::event::{BusyInterval, CalendarEvent};
use timebridge::service::retry::RetryPolicy;

/// Calendar stub that fails `create_event` transiently a configured number
/// of times before succeeding, and serves created events back on read.
struct MockCalendar {
    transient_failures: usize,
    create_calls: AtomicUsize,
    get_calls: AtomicUsize,
    lose_created_events: bool,
    created: TokioMutex<Vec<CalendarEvent>>,
}

impl MockCalendar {
    fn new(transient_failures: usize) -> Self {
        Self {
            transient_failures,
            create_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
            lose_created_events: false,
            created: TokioMutex::new(Vec::new()),
        }
    }

    fn losing_events(mut self) -> Self {
        self.lose_created_events = true;
        self
    }
}

#[async_trait]
impl CalendarApi for MockCalendar {
    async fn list_events(
        &self,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, CalendarError> {
        Ok(Vec::new())
    }

    async fn create_event(&self, event: &CalendarEvent) -> Result<CalendarEvent, CalendarError> {
        let attempt = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.transient_failures {
            return Err(CalendarError::Transient {
                status: Some(503),
                message: "backend unavailable".to_string(),
            });
        }
        let mut created = event.clone();
        created.id = Some(format!("evt-{attempt}"));
        self.created.lock().await.push(created.clone());
        Ok(created)
    }

    async fn get_event(&self, event_id: &str) -> Result<Option<CalendarEvent>, CalendarError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.lose_created_events {
            return Ok(None);
        }
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

fn handler(calendar: Arc<MockCalendar>) -> ReminderHandler {
    ReminderHandler::new(calendar, RetryPolicy::default(), chrono_tz::UTC)
}

#[tokio::test]
async fn missing_time_fails_validation_without_touching_the_provider() {
    let calendar = Arc::new(MockCalendar::new(0));
    let reminder = handler(calendar.clone());
    let params = json!({"title": "call mom", "date": "2026-03-02"});

    assert!(!reminder.validate_params(&params));

    let result = reminder.execute(&params, &RequestContext::new()).await;
    assert_eq!(result.status, ResultStatus::Error);
    assert!(!result.suggestions.is_empty());
    assert_eq!(calendar.create_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn non_numeric_time_fails_validation_without_touching_the_provider() {
    let calendar = Arc::new(MockCalendar::new(0));
    let reminder = handler(calendar.clone());
    let params = json!({"title": "call mom", "date": "2026-03-02", "time": "4pm"});

    assert!(!reminder.validate_params(&params));

    let result = reminder.execute(&params, &RequestContext::new()).await;
    assert_eq!(result.status, ResultStatus::Error);
    assert_eq!(calendar.create_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn create_succeeds_on_third_attempt_with_linear_backoff() {
    let calendar = Arc::new(MockCalendar::new(2));
    let reminder = handler(calendar.clone());
    let params = json!({"title": "call mom", "date": "2026-03-02", "time": "16:00"});

    let started = Instant::now();
    let result = reminder.execute(&params, &RequestContext::new()).await;

    // Two transient failures mean two backoff sleeps: 1s then 2s.
    assert_eq!(started.elapsed().as_secs(), 3);
    assert_eq!(result.status, ResultStatus::Success);
    assert!(result.verified);
    assert!(result.message.starts_with("Reminder set for"));
    assert_eq!(calendar.create_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn retry_budget_is_exhausted_after_three_attempts() {
    let calendar = Arc::new(MockCalendar::new(usize::MAX));
    let reminder = handler(calendar.clone());
    let params = json!({"title": "call mom", "date": "2026-03-02", "time": "16:00"});

    let result = reminder.execute(&params, &RequestContext::new()).await;

    assert_eq!(result.status, ResultStatus::Error);
    assert_eq!(result.message, "Failed to set reminder");
    assert!(result.details.is_some());
    assert_eq!(calendar.create_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn unverifiable_event_is_a_creation_failure() {
    let calendar = Arc::new(MockCalendar::new(0).losing_events());
    let reminder = handler(calendar.clone());
    let params = json!({"title": "call mom", "date": "2026-03-02", "time": "16:00"});

    let result = reminder.execute(&params, &RequestContext::new()).await;

    assert_eq!(result.status, ResultStatus::Error);
    // Verification shares the retry budget with creation.
    assert_eq!(calendar.get_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn reminder_keeps_the_requested_wall_clock_time_in_its_timezone() {
    let calendar = Arc::new(MockCalendar::new(0));
    let reminder = handler(calendar.clone());
    let params = json!({
        "title": "tea time",
        "date": "2026-03-05",
        "time": "16:00",
        "timezone": "America/New_York"
    });

    let result = reminder.execute(&params, &RequestContext::new()).await;
    assert_eq!(result.status, ResultStatus::Success);

    let event = result.event.expect("success result should carry the event");
    assert_eq!(event.start.time_zone.as_deref(), Some("America/New_York"));
    let start = DateTime::parse_from_rfc3339(event.start.date_time.as_deref().unwrap())
        .expect("start should be RFC 3339");
    // Local wall-clock hour in the requested zone, regardless of server tz.
    assert_eq!(start.hour(), 16);
    assert_eq!(start.offset().to_string(), "-05:00");

    let end = DateTime::parse_from_rfc3339(event.end.date_time.as_deref().unwrap()).unwrap();
    assert_eq!((end - start).num_minutes(), 1);
}

#[tokio::test]
async fn access_denied_is_reported_as_permissions_problem() {
    struct DeniedCalendar;

    #[async_trait]
    impl CalendarApi for DeniedCalendar {
        async fn list_events(
            &self,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<CalendarEvent>, CalendarError> {
            Ok(Vec::new())
        }

        async fn create_event(
            &self,
            _event: &CalendarEvent,
        ) -> Result<CalendarEvent, CalendarError> {
            Err(CalendarError::Provider {
                status: 403,
                message: "insufficient permissions".to_string(),
            })
        }

        async fn get_event(
            &self,
            _event_id: &str,
        ) -> Result<Option<CalendarEvent>, CalendarError> {
            Ok(None)
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

    let reminder = ReminderHandler::new(
        Arc::new(DeniedCalendar),
        RetryPolicy::default(),
        chrono_tz::UTC,
    );
    let params = json!({"title": "call mom", "date": "2026-03-02", "time": "16:00"});

    let result = reminder.execute(&params, &RequestContext::new()).await;
    assert_eq!(result.status, ResultStatus::Error);
    assert_eq!(
        result.message,
        "Calendar access denied. Please check your permissions."
    );
}
