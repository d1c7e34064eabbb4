mod api;
mod chat_history;
mod critic;
mod error;
mod flash;
mod formatting;
mod poller;
mod render_model;
mod score_sync;
mod sections;
mod session;
mod settings;
mod simulation;
pub(crate) mod types;

pub use api::*;
pub use chat_history::{format_relative, now_secs, ChatHistory, RecentChat};
pub use critic::{format_score, CriticResult, ScoreBadge, EVALUATION_UNAVAILABLE};
pub use error::ClientError;
pub use flash::{FlashKind, FlashQueue, FLASH_DURATION};
pub use formatting::{extract_search_outputs, identifier_label, toggle_label};
pub use poller::{mark_gave_up, reconcile, PollConfig, PollEvent, ProcessingPoller};
pub use render_model::{
    MessageStore, MessageView, ProcessingOverlay, RenderRequest, REFRESH_MESSAGE_ID,
    TYPING_PLACEHOLDER,
};
pub use score_sync::{ScoreSync, ScoreUpdate};
pub use sections::{
    apply_sections, ComparisonSide, CriticView, ExtraData, RegenerationComparison, SearchRecord,
    Section, SectionBody, SectionKey,
};
pub use session::ChatSession;
pub use settings::{Credentials, Settings, SettingsError};
pub use simulation::{SimulationEvent, SimulationFeed, SimulationPoller, KILLED_TEXT};
pub use types::{AppView, OutputNumber, Role};
