//! Socket transport for the dispatcher.
//!
//! The listener binds the configured endpoint and accepts connections on a
//! background thread. Each accepted connection is handed to a
//! [`ConnectionHandler`] on its own named thread.

mod errors;
mod handler;
mod listener;

pub(crate) use self::errors::ListenerError;
pub(crate) use self::handler::{ConnectionHandler, ConnectionStream};
pub(crate) use self::listener::SocketListener;
#[cfg(test)]
pub(crate) use self::listener::ListenerHandle;

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
