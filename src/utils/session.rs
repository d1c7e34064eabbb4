use crate::utils::{ChatRequest, ClientError};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// The single active chat of this window. Background tasks observe the chat id
/// through [`ChatSession::subscribe`] so they always read the current value at
/// fetch time.
#[derive(Clone, Debug)]
pub struct ChatSession {
    chat_id: Arc<watch::Sender<Option<String>>>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for ChatSession {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.chat_id, &other.chat_id)
    }
}

impl ChatSession {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            chat_id: Arc::new(tx),
        }
    }

    pub fn chat_id(&self) -> Option<String> {
        self.chat_id.borrow().clone()
    }

    pub fn require_chat_id(&self) -> Result<String, ClientError> {
        self.chat_id().ok_or(ClientError::NoActiveChat)
    }

    /// Makes `chat_id` the active chat.
    pub fn create(&self, chat_id: impl Into<String>) {
        let chat_id = chat_id.into();
        info!(chat_id = %chat_id, "chat session active");
        self.chat_id.send_replace(Some(chat_id));
    }

    /// Adopts the chat id the server returned, if it differs from the current one.
    pub fn adopt(&self, chat_id: Option<&str>) {
        let Some(chat_id) = chat_id else { return };
        if self.chat_id.borrow().as_deref() != Some(chat_id) {
            self.create(chat_id);
        }
    }

    pub fn destroy(&self) {
        if self.chat_id.send_replace(None).is_some() {
            info!("chat session cleared");
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.chat_id.subscribe()
    }

    pub fn chat_request(&self, user_input: impl Into<String>) -> ChatRequest {
        ChatRequest {
            user_input: user_input.into(),
            chat_id: self.chat_id(),
        }
    }
}
