use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::CalendarError;
use crate::models::event::{BusyInterval, CalendarEvent};

/// OAuth credential bundle handed over by the identity boundary. Opaque to
/// the rest of the system; only this client reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialBundle {
    pub token: String,
    pub refresh_token: Option<String>,
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    pub scopes: Vec<String>,
}

/// Calendar provider operations the handlers consume. Implemented by the
/// Google client in production and by in-memory mocks in tests.
#[async_trait]
pub trait CalendarApi: Send + Sync {
    async fn list_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, CalendarError>;

    async fn create_event(&self, event: &CalendarEvent) -> Result<CalendarEvent, CalendarError>;

    async fn get_event(&self, event_id: &str) -> Result<Option<CalendarEvent>, CalendarError>;

    async fn free_busy(
        &self,
        attendees: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<HashMap<String, Vec<BusyInterval>>, CalendarError>;
}

const API_BASE: &str = "https://www.googleapis.com/calendar/v3";

#[derive(Debug, Serialize)]
struct FreeBusyRequestItem<'a> {
    id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FreeBusyRequest<'a> {
    time_min: String,
    time_max: String,
    items: Vec<FreeBusyRequestItem<'a>>,
}

#[derive(Debug, Deserialize)]
struct FreeBusyResponse {
    #[serde(default)]
    calendars: HashMap<String, FreeBusyCalendar>,
}

#[derive(Debug, Deserialize)]
struct FreeBusyCalendar {
    #[serde(default)]
    busy: Vec<BusyInterval>,
}

#[derive(Debug, Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<CalendarEvent>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
}

/// Thin wrapper over the Google Calendar v3 REST API against the user's
/// primary calendar. Owns the credential lifecycle: an expired access token
/// is refreshed transparently and the request replayed once, so callers
/// never see a 401 that a refresh token could have absorbed.
pub struct GoogleCalendarClient {
    http: reqwest::Client,
    credentials: Mutex<CredentialBundle>,
}

impl GoogleCalendarClient {
    pub fn new(credentials: CredentialBundle) -> Self {
        Self {
            http: reqwest::Client::new(),
            credentials: Mutex::new(credentials),
        }
    }

    async fn access_token(&self) -> String {
        self.credentials.lock().await.token.clone()
    }

    /// Exchange the refresh token for a new access token. Returns false
    /// when no refresh token is present, in which case the original 401
    /// stands.
    async fn try_refresh(&self) -> Result<bool, CalendarError> {
        let (token_uri, params) = {
            let creds = self.credentials.lock().await;
            let Some(refresh_token) = creds.refresh_token.clone() else {
                return Ok(false);
            };
            (
                creds.token_uri.clone(),
                [
                    ("client_id", creds.client_id.clone()),
                    ("client_secret", creds.client_secret.clone()),
                    ("refresh_token", refresh_token),
                    ("grant_type", "refresh_token".to_string()),
                ],
            )
        };

        let response = self
            .http
            .post(&token_uri)
            .form(&params)
            .send()
            .await
            .map_err(CalendarError::network)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            warn!(status, "token refresh rejected");
            return Err(CalendarError::Provider {
                status: 401,
                message: format!("token refresh failed with status {status}"),
            });
        }

        let refreshed: RefreshResponse = response
            .json()
            .await
            .map_err(CalendarError::network)?;
        self.credentials.lock().await.token = refreshed.access_token;
        info!("access token refreshed");
        Ok(true)
    }

    /// Send an authorized request, refreshing the token and replaying once
    /// on 401.
    async fn send_authorized<B>(&self, build: B) -> Result<reqwest::Response, CalendarError>
    where
        B: Fn(&reqwest::Client, &str) -> reqwest::RequestBuilder,
    {
        let token = self.access_token().await;
        let response = build(&self.http, &token)
            .send()
            .await
            .map_err(CalendarError::network)?;

        if response.status().as_u16() == 401 && self.try_refresh().await? {
            let token = self.access_token().await;
            return build(&self.http, &token)
                .send()
                .await
                .map_err(CalendarError::network);
        }

        Ok(response)
    }

    async fn into_error(response: reqwest::Response) -> CalendarError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        CalendarError::from_status(status, body)
    }
}

fn rfc3339(moment: DateTime<Utc>) -> String {
    moment.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
impl CalendarApi for GoogleCalendarClient {
    async fn list_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, CalendarError> {
        let response = self
            .send_authorized(|http, token| {
                http.get(format!("{API_BASE}/calendars/primary/events"))
                    .bearer_auth(token)
                    .query(&[
                        ("timeMin", rfc3339(start)),
                        ("timeMax", rfc3339(end)),
                        ("singleEvents", "true".to_string()),
                        ("orderBy", "startTime".to_string()),
                    ])
            })
            .await?;

        if !response.status().is_success() {
            return Err(Self::into_error(response).await);
        }
        let list: EventList = response.json().await.map_err(CalendarError::network)?;
        Ok(list.items)
    }

    async fn create_event(&self, event: &CalendarEvent) -> Result<CalendarEvent, CalendarError> {
        let response = self
            .send_authorized(|http, token| {
                http.post(format!("{API_BASE}/calendars/primary/events"))
                    .bearer_auth(token)
                    .json(event)
            })
            .await?;

        if !response.status().is_success() {
            return Err(Self::into_error(response).await);
        }
        let created: CalendarEvent = response.json().await.map_err(CalendarError::network)?;
        debug!(summary = %created.summary, "event created");
        Ok(created)
    }

    async fn get_event(&self, event_id: &str) -> Result<Option<CalendarEvent>, CalendarError> {
        let response = self
            .send_authorized(|http, token| {
                http.get(format!("{API_BASE}/calendars/primary/events/{event_id}"))
                    .bearer_auth(token)
            })
            .await?;

        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::into_error(response).await);
        }
        let event: CalendarEvent = response.json().await.map_err(CalendarError::network)?;
        Ok(Some(event))
    }

    async fn free_busy(
        &self,
        attendees: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<HashMap<String, Vec<BusyInterval>>, CalendarError> {
        let request = FreeBusyRequest {
            time_min: rfc3339(start),
            time_max: rfc3339(end),
            items: attendees
                .iter()
                .map(|id| FreeBusyRequestItem { id })
                .collect(),
        };

        let response = self
            .send_authorized(|http, token| {
                http.post(format!("{API_BASE}/freeBusy"))
                    .bearer_auth(token)
                    .json(&request)
            })
            .await?;

        if !response.status().is_success() {
            return Err(Self::into_error(response).await);
        }
        let parsed: FreeBusyResponse = response.json().await.map_err(CalendarError::network)?;
        Ok(parsed
            .calendars
            .into_iter()
            .map(|(attendee, calendar)| (attendee, calendar.busy))
            .collect())
    }
}
