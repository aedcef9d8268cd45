//! Shared test doubles for the daemon suites.

mod config_loader;
mod reporter;

pub(crate) use config_loader::{FailingConfigLoader, TestConfigLoader};
pub(crate) use reporter::{HealthEvent, RecordingHealthReporter};
