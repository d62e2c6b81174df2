use chrono::DateTime;
use chrono_tz::Tz;

/// Build the chat prompt for one inbound message. Stateless: everything the
/// model needs (current local time, the user's timezone, the response
/// schema) is embedded in the text.
pub fn chat_prompt(now_local: DateTime<Tz>, timezone: Tz, message: &str) -> String {
    format!(
        "You are TimeBridge, an intelligent calendar assistant. Your primary focus is calendar \
         management and scheduling. If the user asks about non-calendar topics, politely redirect \
         them to calendar-related assistance.\n\
         Current date and time: {now}\n\
         User timezone: {tz}\n\
         Respond ONLY with a single valid JSON object, no prose, markdown, or code fences.\n\
         The JSON shape must be exactly:\n\
         {{\"message\": \"<your natural reply>\", \"calendar_action\": {{\"type\": \
         \"reminder|meeting|schedule|recurring\", \"details\": {{}}}} or null, \
         \"suggestions\": [\"<follow-up>\"]}}\n\
         Detail fields by action type:\n\
         - reminder: \"title\", \"date\" (YYYY-MM-DD), \"time\" (HH:MM, 24-hour), optional \
         \"description\", \"timezone\", \"method\" (popup|email), \"minutes\"\n\
         - meeting: \"attendees\" (emails), \"duration_minutes\", \"preferred_days\" (weekday \
         names), \"time_range\" {{\"start\": \"HH:MM\", \"end\": \"HH:MM\"}}\n\
         - schedule: \"topics\", \"start_date\", \"end_date\", \"daily_hours\", \
         \"preferred_time\" (HH:MM), optional \"excluded_days\"\n\
         - recurring: same as reminder plus \"frequency\" (daily|weekly|monthly|yearly)\n\
         Resolve relative dates (\"tomorrow\", \"next Tuesday\") against the current date and \
         time above, in the user's timezone.\n\
         If no calendar action is requested, set \"calendar_action\" to null.\n\
         User message: \"{message}\"",
        now = now_local.format("%Y-%m-%d %H:%M (%A)"),
        tz = timezone.name(),
        message = message,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::America::New_York;

    #[test]
    fn prompt_embeds_time_timezone_and_message() {
        let now = New_York.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap();
        let prompt = chat_prompt(now, New_York, "remind me to call mom at 4pm");

        assert!(prompt.contains("2026-03-02 09:30"));
        assert!(prompt.contains("America/New_York"));
        assert!(prompt.contains("remind me to call mom at 4pm"));
        assert!(prompt.contains("\"calendar_action\""));
    }
}
