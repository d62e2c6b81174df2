use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Closed set of calendar action types the assistant recognizes. Anything
/// the model invents beyond these is folded into `Unknown` and answered
/// with a clarification request rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentKind {
    Reminder,
    Meeting,
    Schedule,
    Recurring,
    Unknown,
}

impl IntentKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "reminder" => IntentKind::Reminder,
            "meeting" => IntentKind::Meeting,
            "schedule" => IntentKind::Schedule,
            "recurring" => IntentKind::Recurring,
            _ => IntentKind::Unknown,
        }
    }
}

/// One recognized calendar action. Created per inbound message, consumed by
/// exactly one handler, then discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub kind: IntentKind,
    pub details: Map<String, Value>,
}

/// Raw shape the language model is instructed to reply with.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelReply {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub calendar_action: Option<ModelAction>,
    #[serde(default)]
    pub suggestions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelAction {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default)]
    pub details: Map<String, Value>,
}

/// What every request ultimately resolves to, success or failure: a friendly
/// message, optionally the action data, and at least one suggestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar_actions: Option<Value>,
    pub suggestions: Vec<String>,
}

impl AssistantResponse {
    /// Generic recovery reply used whenever the model output cannot be
    /// understood. Interpretation problems never surface as system failures.
    pub fn fallback() -> Self {
        Self {
            message: "I apologize, but I'm having trouble understanding. Could you rephrase that?"
                .to_string(),
            calendar_actions: None,
            suggestions: vec!["Try asking in a different way".to_string()],
        }
    }

    pub fn default_suggestions() -> Vec<String> {
        vec![
            "Schedule a meeting".to_string(),
            "Set a reminder".to_string(),
            "Check availability".to_string(),
        ]
    }
}
