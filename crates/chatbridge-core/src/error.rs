use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors raised by bridge operations.
///
/// Inbound handlers convert every variant into a structured
/// `{status: "error", message}` body at the HTTP boundary.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Token resolution failed. Carries no detail about which tier was checked.
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Nothing configured at any tier for the requested setting
    #[error("Not configured: {0}")]
    Unconfigured(String),

    /// Outbound delivery failed (only ever logged)
    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Chat host error: {0}")]
    Host(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Whether the caller caused the error (as opposed to a server fault)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            BridgeError::Unauthorized | BridgeError::NotFound(_) | BridgeError::BadRequest(_)
        )
    }
}

impl From<config::ConfigError> for BridgeError {
    fn from(err: config::ConfigError) -> Self {
        BridgeError::Configuration(err.to_string())
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::BadRequest(format!("invalid JSON: {}", err))
    }
}
