use std::time::Duration;
use uuid::Uuid;

/// How long a flash notification stays on screen.
pub const FLASH_DURATION: Duration = Duration::from_secs(3);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlashKind {
    Success,
    Info,
    Error,
}

impl FlashKind {
    pub fn css_class(self) -> &'static str {
        match self {
            FlashKind::Success => "bg-green-600",
            FlashKind::Info => "bg-blue-600",
            FlashKind::Error => "bg-red-600",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FlashMessage {
    pub id: Uuid,
    pub kind: FlashKind,
    pub text: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlashQueue {
    messages: Vec<FlashMessage>,
}

impl FlashQueue {
    pub fn push(&mut self, kind: FlashKind, text: impl Into<String>) -> Uuid {
        let id = Uuid::new_v4();
        self.messages.push(FlashMessage {
            id,
            kind,
            text: text.into(),
        });
        id
    }

    pub fn dismiss(&mut self, id: Uuid) {
        self.messages.retain(|m| m.id != id);
    }

    pub fn messages(&self) -> &[FlashMessage] {
        &self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_dismiss() {
        let mut queue = FlashQueue::default();
        let first = queue.push(FlashKind::Success, "Simulation started successfully!");
        let second = queue.push(FlashKind::Error, "Simulation was killed after waiting too long");
        assert_eq!(queue.messages().len(), 2);

        queue.dismiss(first);
        assert_eq!(queue.messages()[0].id, second);
        assert_eq!(queue.messages()[0].kind.css_class(), "bg-red-600");

        queue.dismiss(second);
        assert!(queue.messages().is_empty());
    }
}
