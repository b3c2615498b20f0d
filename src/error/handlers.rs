//! Error handlers
//!
//! Provides error classification and reporting helpers.

use crate::error::types::SocketError;
use log::error;
use std::io;

/// Log a socket error that is not propagated any further
pub fn handle_error(err: &SocketError) {
    error!("Socket error: {}", err);
}

/// Whether a bind failure is worth retrying
///
/// Any OS-level bind failure is retried; the common case is an address
/// still held by a previous process.
pub fn is_retryable_bind(_err: &io::Error) -> bool {
    true
}

/// Whether a connect failure is worth retrying
pub fn is_retryable_connect(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::ConnectionRefused
}
