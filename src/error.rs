use thiserror::Error;

/// Failures while turning model text into a structured intent. These are
/// always recovered at the gateway with a clarification response.
#[derive(Debug, Error)]
pub enum InterpretError {
    #[error("language model call failed: {0}")]
    ModelUnavailable(String),
    #[error("no JSON object found in model response")]
    NoJsonFound,
    #[error("model response is missing required field `{0}`")]
    MissingFields(&'static str),
}

/// Failures talking to the generative-language endpoint.
#[derive(Debug, Error)]
pub enum ModelCallError {
    #[error("request to language model failed: {0}")]
    Http(String),
    #[error("unexpected language model response: {0}")]
    BadResponse(String),
}

impl From<reqwest::Error> for ModelCallError {
    fn from(err: reqwest::Error) -> Self {
        ModelCallError::Http(err.to_string())
    }
}

/// Failures from the calendar provider, classified for the retry policy.
#[derive(Debug, Error)]
pub enum CalendarError {
    /// Rate limits, 5xx responses and network-level faults. Worth retrying.
    #[error("transient provider error{}: {message}", fmt_status(.status))]
    Transient { status: Option<u16>, message: String },

    /// Definitive provider rejection (401, 403, other 4xx). Never retried.
    #[error("provider error (status {status}): {message}")]
    Provider { status: u16, message: String },

    /// Created event could not be read back or came back with a different
    /// id. Shares the creation retry budget.
    #[error("event verification failed: {0}")]
    Verification(String),

    /// The caller abandoned the request between retry attempts.
    #[error("operation cancelled")]
    Cancelled,
}

fn fmt_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (status {code})"),
        None => String::new(),
    }
}

impl CalendarError {
    /// Classify a provider HTTP status. 429 and 5xx are transient; any
    /// other non-success status is a definitive rejection.
    pub fn from_status(status: u16, message: String) -> Self {
        if status == 429 || status >= 500 {
            CalendarError::Transient {
                status: Some(status),
                message,
            }
        } else {
            CalendarError::Provider { status, message }
        }
    }

    pub fn network(err: reqwest::Error) -> Self {
        CalendarError::Transient {
            status: None,
            message: err.to_string(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CalendarError::Transient { .. } | CalendarError::Verification(_)
        )
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            CalendarError::Transient { status, .. } => *status,
            CalendarError::Provider { status, .. } => Some(*status),
            _ => None,
        }
    }
}
