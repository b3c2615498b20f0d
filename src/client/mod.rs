//! Client
//!
//! The connecting side: connect with retry, one receive task, send.

pub mod config;
pub mod core;
pub mod handler;

pub use self::core::{Client, ClientBuilder, TextHandler};
pub use self::config::ClientConfig;
