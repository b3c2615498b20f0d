//! Message dispatch
//!
//! Turns one received chunk into zero or more handler calls according to
//! the configured command and argument delimiters.

use std::fmt;
use std::sync::Arc;

use crate::error::HandlerError;
use crate::protocol::parser::{split_bytes, split_commands};
use crate::server::ConnectionHandle;

/// Callback receiving parsed message data on the server side.
///
/// Called with the positional tokens of one command and, in
/// [`DispatchMode::PerClient`], the connection it came from. The connection
/// accompanies every call in that mode, split commands included, so a
/// handler can reply per command; it is never mixed into the tokens.
pub type MessageHandler =
    Arc<dyn Fn(&[&[u8]], Option<&ConnectionHandle>) -> Result<(), HandlerError> + Send + Sync>;

/// Wrap a closure as a [`MessageHandler`].
pub fn message_handler<F>(f: F) -> MessageHandler
where
    F: Fn(&[&[u8]], Option<&ConnectionHandle>) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Whether the originating connection is passed to the handler.
///
/// Chosen once when the server is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    #[default]
    ClientAgnostic,
    PerClient,
}

#[derive(Clone, Default)]
pub struct Dispatcher {
    handler: Option<MessageHandler>,
    command_delimiter: Option<Vec<u8>>,
    argument_delimiter: Option<Vec<u8>>,
    mode: DispatchMode,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("handler", &self.handler.is_some())
            .field("command_delimiter", &self.command_delimiter)
            .field("argument_delimiter", &self.argument_delimiter)
            .field("mode", &self.mode)
            .finish()
    }
}

impl Dispatcher {
    pub fn new(handler: Option<MessageHandler>, mode: DispatchMode) -> Self {
        Self {
            handler,
            command_delimiter: None,
            argument_delimiter: None,
            mode,
        }
    }

    /// An empty delimiter leaves command splitting disabled.
    pub fn with_command_delimiter(mut self, delimiter: Option<impl AsRef<[u8]>>) -> Self {
        self.command_delimiter = non_empty(delimiter);
        self
    }

    /// An empty delimiter leaves argument splitting disabled.
    pub fn with_argument_delimiter(mut self, delimiter: Option<impl AsRef<[u8]>>) -> Self {
        self.argument_delimiter = non_empty(delimiter);
        self
    }

    /// Dispatch one received payload and return the number of handler calls.
    ///
    /// A handler error stops the remaining calls for this payload.
    pub fn dispatch(&self, payload: &[u8], conn: &ConnectionHandle) -> Result<usize, HandlerError> {
        let Some(handler) = &self.handler else {
            return Ok(0);
        };
        let conn = match self.mode {
            DispatchMode::PerClient => Some(conn),
            DispatchMode::ClientAgnostic => None,
        };

        match (&self.command_delimiter, &self.argument_delimiter) {
            (Some(command_delimiter), argument_delimiter) => {
                let mut calls = 0;
                for fragment in split_commands(payload, command_delimiter) {
                    match argument_delimiter {
                        Some(delimiter) => handler(&split_bytes(fragment, delimiter), conn)?,
                        None => handler(&[fragment], conn)?,
                    }
                    calls += 1;
                }
                Ok(calls)
            }
            (None, Some(argument_delimiter)) => {
                handler(&split_bytes(payload, argument_delimiter), conn)?;
                Ok(1)
            }
            (None, None) => {
                handler(&[payload], conn)?;
                Ok(1)
            }
        }
    }
}

fn non_empty(delimiter: Option<impl AsRef<[u8]>>) -> Option<Vec<u8>> {
    delimiter
        .map(|d| d.as_ref().to_vec())
        .filter(|d| !d.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    type Calls = Arc<Mutex<Vec<(Vec<Vec<u8>>, Option<u64>)>>>;

    fn recording_handler() -> (MessageHandler, Calls) {
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        let handler = message_handler(move |args, conn| {
            let args = args.iter().map(|a| a.to_vec()).collect();
            sink.lock().unwrap().push((args, conn.map(|c| c.id())));
            Ok(())
        });
        (handler, calls)
    }

    fn handle() -> ConnectionHandle {
        ConnectionHandle::new(3, None)
    }

    fn owned(parts: &[&str]) -> Vec<Vec<u8>> {
        parts.iter().map(|p| p.as_bytes().to_vec()).collect()
    }

    #[test]
    fn test_commands_and_arguments() {
        let (handler, calls) = recording_handler();
        let dispatcher = Dispatcher::new(Some(handler), DispatchMode::ClientAgnostic)
            .with_command_delimiter(Some(b"\n"))
            .with_argument_delimiter(Some(b" "));

        let count = dispatcher.dispatch(b"ADD 1 2\nADD 3 4\n", &handle()).unwrap();

        assert_eq!(count, 2);
        let calls = calls.lock().unwrap();
        assert_eq!(calls[0], (owned(&["ADD", "1", "2"]), None));
        assert_eq!(calls[1], (owned(&["ADD", "3", "4"]), None));
    }

    #[test]
    fn test_call_count_matches_fragments_and_arity_matches_tokens() {
        let (handler, calls) = recording_handler();
        let dispatcher = Dispatcher::new(Some(handler), DispatchMode::ClientAgnostic)
            .with_command_delimiter(Some(b";"))
            .with_argument_delimiter(Some(b","));

        let payload = b"a,b;c;d,e,f";
        let count = dispatcher.dispatch(payload, &handle()).unwrap();

        let expected: Vec<usize> = split_bytes(payload, b";")
            .iter()
            .map(|fragment| split_bytes(fragment, b",").len())
            .collect();
        let arities: Vec<usize> = calls.lock().unwrap().iter().map(|(a, _)| a.len()).collect();
        assert_eq!(count, expected.len());
        assert_eq!(arities, expected);
    }

    #[test]
    fn test_commands_without_argument_delimiter() {
        let (handler, calls) = recording_handler();
        let dispatcher = Dispatcher::new(Some(handler), DispatchMode::ClientAgnostic)
            .with_command_delimiter(Some(b"\n"));

        dispatcher.dispatch(b"PING\nSTATUS now", &handle()).unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].0, owned(&["STATUS now"]));
    }

    #[test]
    fn test_arguments_only_splits_whole_payload_once() {
        let (handler, calls) = recording_handler();
        let dispatcher = Dispatcher::new(Some(handler), DispatchMode::ClientAgnostic)
            .with_argument_delimiter(Some(b" "));

        let count = dispatcher.dispatch(b"MOVE 10 20\nX", &handle()).unwrap();

        assert_eq!(count, 1);
        assert_eq!(calls.lock().unwrap()[0].0, owned(&["MOVE", "10", "20\nX"]));
    }

    #[test]
    fn test_no_delimiters_passes_raw_payload_and_connection() {
        let (handler, calls) = recording_handler();
        let dispatcher = Dispatcher::new(Some(handler), DispatchMode::PerClient);

        let count = dispatcher.dispatch(b"raw bytes\n", &handle()).unwrap();

        assert_eq!(count, 1);
        assert_eq!(calls.lock().unwrap()[0], (owned(&["raw bytes\n"]), Some(3)));
    }

    #[test]
    fn test_per_client_connection_accompanies_every_command() {
        let (handler, calls) = recording_handler();
        let dispatcher = Dispatcher::new(Some(handler), DispatchMode::PerClient)
            .with_command_delimiter(Some(b"\n"))
            .with_argument_delimiter(Some(b" "));

        dispatcher.dispatch(b"ADD 1 2\nPING", &handle()).unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls[0], (owned(&["ADD", "1", "2"]), Some(3)));
        assert_eq!(calls[1], (owned(&["PING"]), Some(3)));
    }

    #[test]
    fn test_empty_delimiters_are_ignored() {
        let (handler, calls) = recording_handler();
        let dispatcher = Dispatcher::new(Some(handler), DispatchMode::ClientAgnostic)
            .with_command_delimiter(Some(b""))
            .with_argument_delimiter(Some(b""));

        dispatcher.dispatch(b"a b\nc", &handle()).unwrap();

        assert_eq!(calls.lock().unwrap()[0].0, owned(&["a b\nc"]));
    }

    #[test]
    fn test_missing_handler_discards() {
        let dispatcher = Dispatcher::new(None, DispatchMode::PerClient)
            .with_command_delimiter(Some(b"\n"));
        assert_eq!(dispatcher.dispatch(b"a\nb", &handle()).unwrap(), 0);
    }

    #[test]
    fn test_handler_error_stops_remaining_commands() {
        let seen = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&seen);
        let handler = message_handler(move |args, _| {
            *counter.lock().unwrap() += 1;
            if args[0] == b"BAD" {
                Err(HandlerError::new("unknown command"))
            } else {
                Ok(())
            }
        });
        let dispatcher = Dispatcher::new(Some(handler), DispatchMode::ClientAgnostic)
            .with_command_delimiter(Some(b"\n"));

        let err = dispatcher.dispatch(b"OK\nBAD\nOK", &handle()).unwrap_err();

        assert_eq!(err.message(), "unknown command");
        assert_eq!(*seen.lock().unwrap(), 2);
    }
}
