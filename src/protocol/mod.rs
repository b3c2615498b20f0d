//! Message protocol
//!
//! Delimiter-based splitting of raw payloads and dispatch to handlers.

pub mod dispatch;
pub mod parser;

pub use dispatch::{DispatchMode, Dispatcher, MessageHandler, message_handler};
pub use parser::{split_bytes, split_commands};
