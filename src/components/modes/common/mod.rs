mod bubble;
mod chat;
mod flash;
mod input;
mod processing_indicator;
mod sections;

pub use bubble::{BubbleOptions, MessageBubble};
pub use chat::ChatDisplay;
pub use flash::{flash, FlashStack};
pub use input::ChatInput;
pub use processing_indicator::{ProcessingIndicator, TypingDots};
pub use sections::{ComparisonPanel, ExtraSections};
