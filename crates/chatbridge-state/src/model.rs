use chatbridge_core::ChannelId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Reserved specialist tag: a human operator owns the conversation
pub const HUMAN_SPECIALIST: &str = "human";

/// Handoff state of one chat channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelState {
    pub tenant_id: String,
    pub channel_id: ChannelId,
    /// Owner of the conversation; `None` is the initial, unset ownership
    pub active_specialist: Option<String>,
    pub last_interaction: DateTime<Utc>,
    /// JSON-encoded session variables owned by the automation service
    pub context: Option<String>,
    /// Downstream business record generated from the conversation
    pub lead_id: Option<i64>,
}

impl ChannelState {
    pub fn new(tenant_id: &str, channel_id: ChannelId) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            channel_id,
            active_specialist: None,
            last_interaction: Utc::now(),
            context: None,
            lead_id: None,
        }
    }

    /// Non-empty specialist tag
    pub fn specialist(&self) -> Option<&str> {
        self.active_specialist
            .as_deref()
            .filter(|s| !s.trim().is_empty())
    }

    pub fn is_human(&self) -> bool {
        self.specialist() == Some(HUMAN_SPECIALIST)
    }

    /// Stored context parsed as JSON.
    ///
    /// Absent or malformed context yields an empty object.
    pub fn context_value(&self) -> Value {
        let Some(raw) = self.context.as_deref().filter(|c| !c.trim().is_empty()) else {
            return Value::Object(Map::new());
        };

        match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    channel_id = %self.channel_id,
                    error = %e,
                    "Stored channel context is not valid JSON"
                );
                Value::Object(Map::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state(specialist: Option<&str>, context: Option<&str>) -> ChannelState {
        let mut state = ChannelState::new("default", ChannelId::new(42));
        state.active_specialist = specialist.map(String::from);
        state.context = context.map(String::from);
        state
    }

    #[test]
    fn test_specialist_and_human() {
        assert_eq!(state(None, None).specialist(), None);
        assert_eq!(state(Some(""), None).specialist(), None);
        assert_eq!(state(Some("sales"), None).specialist(), Some("sales"));
        assert!(!state(Some("sales"), None).is_human());
        assert!(state(Some(HUMAN_SPECIALIST), None).is_human());
    }

    #[test]
    fn test_context_value() {
        assert_eq!(state(None, None).context_value(), json!({}));
        assert_eq!(state(None, Some(r#"{"a":1}"#)).context_value(), json!({"a": 1}));
        assert_eq!(state(None, Some("{not json")).context_value(), json!({}));
        assert_eq!(state(None, Some("  ")).context_value(), json!({}));
    }
}
