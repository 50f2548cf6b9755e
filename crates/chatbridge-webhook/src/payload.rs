//! Outbound webhook payload

use chatbridge_core::{Author, ChannelId, ChatMessage, CHANNEL_MODEL};
use chatbridge_state::ChannelState;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Author reference as the automation service expects it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AuthorRef {
    /// Partner id
    Partner(i64),
    /// `guest_<id>` or `unknown`
    Label(String),
}

impl From<&Author> for AuthorRef {
    fn from(author: &Author) -> Self {
        match author {
            Author::Partner { id, .. } => AuthorRef::Partner(id.get()),
            Author::Guest { id, .. } => AuthorRef::Label(format!("guest_{}", id)),
            Author::Unknown => AuthorRef::Label("unknown".to_string()),
        }
    }
}

/// JSON body posted to the webhook for one chat message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundPayload {
    pub body: String,
    pub author_id: AuthorRef,
    pub author_name: String,
    pub res_id: i64,
    pub res_model: String,
    pub message_id: i64,
    #[serde(serialize_with = "specialist_or_false")]
    pub active_specialist: Option<String>,
    pub context_data: Value,
}

impl OutboundPayload {
    /// Build the payload for a channel message and the channel's current state
    pub fn new(message: &ChatMessage, channel: ChannelId, state: Option<&ChannelState>) -> Self {
        Self {
            body: message.body.clone(),
            author_id: AuthorRef::from(&message.author),
            author_name: message.author.display_name().to_string(),
            res_id: channel.get(),
            res_model: CHANNEL_MODEL.to_string(),
            message_id: message.id.get(),
            active_specialist: state.and_then(|s| s.specialist()).map(String::from),
            context_data: state
                .map(ChannelState::context_value)
                .unwrap_or_else(|| Value::Object(Map::new())),
        }
    }
}

/// Serialize an unset specialist as JSON `false`
pub fn specialist_or_false<S>(specialist: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match specialist {
        Some(tag) => serializer.serialize_str(tag),
        None => serializer.serialize_bool(false),
    }
}
