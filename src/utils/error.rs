use thiserror::Error;

/// Failures surfaced by the backend client and the background pollers.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClientError {
    /// The request never produced a usable response (connect, timeout, body read).
    #[error("request to {url} failed: {detail}")]
    Transport { url: String, detail: String },

    /// The server answered with an `error` field or a non-success status.
    #[error("server error ({status}): {message}")]
    Api { status: u16, message: String },

    /// A response body or an embedded payload could not be decoded.
    #[error("could not parse {what}: {detail}")]
    Parse { what: String, detail: String },

    /// The server bounced the request to its login page.
    #[error("not logged in")]
    Unauthorized,

    #[error("no active chat")]
    NoActiveChat,
}

impl ClientError {
    pub fn parse(what: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        ClientError::Parse {
            what: what.into(),
            detail: detail.to_string(),
        }
    }

    /// Message suitable for an error bubble or flash notification.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Api { message, .. } => message.clone(),
            ClientError::Unauthorized => "Please log in from the Settings view.".to_string(),
            ClientError::NoActiveChat => "No active chat. Send a message first.".to_string(),
            ClientError::Transport { .. } | ClientError::Parse { .. } => {
                "Error: Failed to get response from server.".to_string()
            }
        }
    }
}
