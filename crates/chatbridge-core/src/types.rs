use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tenant used when a request does not name one
pub const DEFAULT_TENANT: &str = "default";

/// Container type of chat channels in the host's message log
pub const CHANNEL_MODEL: &str = "discuss.channel";

/// Author name used in outbound payloads when the host has none
pub const DEFAULT_AUTHOR_NAME: &str = "Guest";

// Newtype wrappers over the host's integer record ids

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            pub fn get(&self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

record_id!(
    /// Chat channel id
    ChannelId
);
record_id!(
    /// Message id in the host's message log
    MessageId
);
record_id!(
    /// Partner (contact) id; operators, portal users and bots are partners
    PartnerId
);
record_id!(
    /// Anonymous visitor id
    GuestId
);

/// Tenant (database) identity threaded through every operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    /// Tenant ID
    pub tenant_id: String,
    /// Request ID for tracing
    pub request_id: Option<String>,
}

impl TenantContext {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: &str) -> Self {
        self.request_id = Some(request_id.to_string());
        self
    }

    /// Key used by in-memory stores scoped per tenant
    pub fn scoped<K>(&self, key: K) -> (String, K) {
        (self.tenant_id.clone(), key)
    }
}

impl Default for TenantContext {
    fn default() -> Self {
        Self::new(DEFAULT_TENANT)
    }
}

/// Author of a chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Author {
    /// A partner record: operator, portal user or bot
    Partner {
        id: PartnerId,
        #[serde(default)]
        name: Option<String>,
    },
    /// An anonymous live-chat visitor
    Guest {
        id: GuestId,
        #[serde(default)]
        name: Option<String>,
    },
    /// No author recorded
    Unknown,
}

impl Author {
    pub fn partner(id: i64, name: impl Into<String>) -> Self {
        Author::Partner {
            id: PartnerId::new(id),
            name: Some(name.into()),
        }
    }

    pub fn guest(id: i64, name: impl Into<String>) -> Self {
        Author::Guest {
            id: GuestId::new(id),
            name: Some(name.into()),
        }
    }

    pub fn partner_id(&self) -> Option<PartnerId> {
        match self {
            Author::Partner { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Display name, falling back to [`DEFAULT_AUTHOR_NAME`]
    pub fn display_name(&self) -> &str {
        let name = match self {
            Author::Partner { name, .. } | Author::Guest { name, .. } => name.as_deref(),
            Author::Unknown => None,
        };
        match name {
            Some(n) if !n.trim().is_empty() => n,
            _ => DEFAULT_AUTHOR_NAME,
        }
    }
}

/// A message appended to the host's message log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    /// Container record type; only [`CHANNEL_MODEL`] is a chat channel
    pub model: Option<String>,
    /// Container record id
    pub res_id: Option<i64>,
    pub author: Author,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// The channel this message belongs to, if its container is a chat channel
    pub fn channel_id(&self) -> Option<ChannelId> {
        match (self.model.as_deref(), self.res_id) {
            (Some(CHANNEL_MODEL), Some(id)) if id > 0 => Some(ChannelId::new(id)),
            _ => None,
        }
    }
}
