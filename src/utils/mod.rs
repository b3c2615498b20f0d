//! Utility functions
//!
//! Shared networking and retry helpers.

pub mod network;
pub mod retry;

pub use network::{peer_label, resolve};
pub use retry::RetryPolicy;
