//! Failures raised while the daemon binds or serves its request socket.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Reasons the request listener could not start or stop cleanly.
///
/// Endpoints are rendered in the same `tcp://` / `unix://` form accepted by
/// the `daemon_socket` setting, so an operator can match the message to the
/// configuration value.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The TCP host did not resolve, or resolved to nothing.
    #[error("cannot resolve daemon endpoint tcp://{host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("cannot listen on tcp://{addr}: {source}")]
    BindTcp {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[cfg(unix)]
    #[error("cannot listen on unix://{path}: {source}")]
    BindUnix {
        path: String,
        #[source]
        source: io::Error,
    },
    /// A live daemon already answers on the socket path.
    #[cfg(unix)]
    #[error("another evad instance is serving unix://{path}")]
    SocketInUse { path: String },
    #[cfg(unix)]
    #[error("refusing to replace unix://{path}: existing file is not a socket")]
    NotASocket { path: String },
    #[cfg(unix)]
    #[error("cannot probe existing unix://{path}: {source}")]
    UnixProbe {
        path: String,
        #[source]
        source: io::Error,
    },
    #[cfg(unix)]
    #[error("cannot remove stale socket unix://{path}: {source}")]
    StaleSocket {
        path: String,
        #[source]
        source: io::Error,
    },
    #[cfg(not(unix))]
    #[error("unix sockets are unavailable on this platform: {endpoint}")]
    UnsupportedUnix { endpoint: String },
    #[error("cannot switch the request listener to non-blocking mode: {source}")]
    NonBlocking {
        #[source]
        source: io::Error,
    },
    #[error("cannot start the accept thread: {source}")]
    Spawn {
        #[source]
        source: io::Error,
    },
    #[error("accept thread panicked")]
    AcceptThreadPanicked,
}
