mod header;
pub mod modes;
mod sidebar;

pub use header::Header;
pub use modes::{flash, Chat, FlashStack, Settings, Simulation};
pub use sidebar::Sidebar;
