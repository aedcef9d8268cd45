//! Test suites for the EVA daemon.

#[cfg(unix)]
mod process_behaviour;
pub(crate) mod support;
