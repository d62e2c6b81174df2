use chrono_tz::Tz;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Per-request state threaded through the gateway and handlers. Each
/// inbound message gets a fresh context; nothing here outlives the request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub user_id: Option<String>,
    /// Timezone resolved at the request boundary (user preference). Handler
    /// params may still override it per action.
    pub timezone: Option<Tz>,
    pub cancel: CancellationToken,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            user_id: None,
            timezone: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = Some(timezone);
        self
    }

    pub fn with_user(mut self, user_id: String) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
