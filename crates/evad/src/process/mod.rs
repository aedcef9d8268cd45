//! Process entry point: runtime construction, serving and shutdown.

use std::time::Duration;

mod errors;
pub(crate) mod launch;
pub(crate) mod shutdown;

pub use errors::LaunchError;
pub use launch::run_daemon;
pub use shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
/// Grace period for in-flight request tasks once the listener has stopped.
pub(crate) const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);
