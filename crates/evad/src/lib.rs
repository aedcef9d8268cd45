//! The EVA request dispatcher daemon.
//!
//! `evad` serves four capability components over a line-oriented JSON
//! socket protocol:
//!
//! - `nlp_*` methods go to the text processor,
//! - `ml_*` methods to the model trainer,
//! - `data_*` methods to the data analyzer,
//! - `neural_*` methods to the neural engine.
//!
//! Anything else is handled by the general handler, which answers
//! `health_check` and `get_capabilities`.
//!
//! Startup runs in two phases. [`bootstrap_with`] loads configuration,
//! installs telemetry and assembles an uninitialised [`Dispatcher`]; the
//! process entry point then builds the tokio runtime and calls
//! [`Dispatcher::initialize`], which brings every component up in order and
//! loads the model catalog. A failure in either phase is fatal.
//!
//! Every request produces exactly one response with the caller's
//! `request_id`. Failures of any kind, including decode errors at the
//! transport, timeouts and unknown methods, are reported inside that
//! response rather than by dropping the connection.

mod bootstrap;
pub mod components;
pub mod dispatch;
mod health;
mod process;
mod telemetry;
mod transport;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use dispatch::{Dispatcher, DispatcherSettings, Lifecycle};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{LaunchError, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_daemon};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
