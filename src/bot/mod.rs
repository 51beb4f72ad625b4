//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `message_handler`: commands, text answers and document uploads
//! - `callback_handler`: inline keyboard answers (currency, scale)
//! - `ui_builder`: keyboards and message formatting
//! - `dialogue_manager`: pitch state transitions and proposal delivery

use crate::pipeline::PitchPipeline;

pub mod callback_handler;
pub mod dialogue_manager;
pub mod message_handler;
pub mod ui_builder;

pub use callback_handler::callback_handler;
pub use message_handler::message_handler;

/// Number of proposals shown by `/proposals`
pub const RECENT_PROPOSALS: usize = 10;

/// Shared state injected into every handler
pub struct BotContext {
    pub pipeline: PitchPipeline,
    /// Base URL prepended to proposal paths in messages
    pub public_base_url: String,
    pub max_document_size: u64,
}
