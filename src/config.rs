use std::collections::HashMap;
use std::fs;

use chrono_tz::Tz;

use crate::handlers::schedule::ConflictPolicy;

/// KEY=VALUE config file, shell-export style. Lines starting with `#` and
/// blank lines are skipped; single or double quotes around values are
/// stripped.
#[derive(Debug, Default, Clone)]
pub struct AppConfig {
    values: HashMap<String, String>,
}

impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self, String> {
        let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
        let mut values = HashMap::new();
        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(format!("Invalid config line {}: {}", idx + 1, line));
            };
            let key = key.trim();
            let mut value = value.trim().to_string();
            if (value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\''))
            {
                value = value[1..value.len() - 1].to_string();
            }
            values.insert(key.to_string(), value);
        }
        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    /// Timezone used when neither the request nor the action names one.
    pub fn default_timezone(&self) -> Tz {
        self.get("DEFAULT_TIMEZONE")
            .and_then(|name| name.parse().ok())
            .unwrap_or(chrono_tz::UTC)
    }

    /// Study-schedule conflict handling: `ignore` (default) or `skip_busy`.
    pub fn conflict_policy(&self) -> ConflictPolicy {
        self.get("CONFLICT_POLICY")
            .as_deref()
            .and_then(ConflictPolicy::parse)
            .unwrap_or(ConflictPolicy::Ignore)
    }
}
