use thiserror::Error;

/// Errors produced while driving a page or talking to collaborators
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Failed to connect to browser: {0}")]
    ConnectionFailed(String),

    #[error("Tab operation failed: {0}")]
    TabOperationFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Script evaluation failed: {0}")]
    EvaluationFailed(String),

    #[error("Failed to parse DOM: {0}")]
    DomParseFailed(String),

    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Element not visible: {0}")]
    ElementNotVisible(String),

    #[error("Gave up on {target} after {attempts} attempts")]
    RetriesExhausted { target: String, attempts: u32 },

    #[error("Cancelled while waiting for {0}")]
    Cancelled(String),

    #[error("Message delivery failed: {0}")]
    Transport(String),

    /// Nobody is listening on the other side of the channel yet
    #[error("No receiver registered for message")]
    NoReceiver,

    #[error("Timed out after {after_ms}ms waiting for {what}")]
    Timeout { what: String, after_ms: u64 },

    #[error("Resume text extraction unavailable: {0}")]
    ExtractionUnavailable(String),

    #[error("Another automation is already in progress")]
    Busy,

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// User-facing failure carried verbatim (failed sequences, errors relayed over the channel)
    #[error("{0}")]
    Rejected(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BrowserError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_user_facing() {
        assert_eq!(BrowserError::Busy.to_string(), "Another automation is already in progress");

        let err = BrowserError::RetriesExhausted { target: "apply button".to_string(), attempts: 3 };
        assert_eq!(err.to_string(), "Gave up on apply button after 3 attempts");

        let err = BrowserError::Timeout { what: "AUTO_APPLY".to_string(), after_ms: 60000 };
        assert_eq!(err.to_string(), "Timed out after 60000ms waiting for AUTO_APPLY");
    }
}
