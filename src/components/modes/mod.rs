mod chat;
mod common;
mod settings;
mod simulation;

pub use chat::Chat;
pub use common::{flash, FlashStack};
pub use settings::Settings;
pub use simulation::Simulation;
