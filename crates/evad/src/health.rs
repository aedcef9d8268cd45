//! Structured health reporting for daemon lifecycle events.

use std::sync::Arc;

use eva_config::Config;

use crate::bootstrap::BootstrapError;
use crate::components::ComponentInitError;
use crate::dispatch::InitialisationError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked before a component is initialised.
    fn component_initialising(&self, component: &str);

    /// Invoked after a component initialises successfully.
    fn component_ready(&self, component: &str);

    /// Invoked when a component fails to initialise.
    fn component_failed(&self, error: &ComponentInitError);

    /// Invoked once every component and the model catalog are ready.
    fn dispatcher_ready(&self, components: usize, models_loaded: usize);

    /// Invoked when dispatcher initialisation fails for any reason.
    fn dispatcher_failed(&self, error: &InitialisationError);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn component_initialising(&self, component: &str) {
        (**self).component_initialising(component);
    }

    fn component_ready(&self, component: &str) {
        (**self).component_ready(component);
    }

    fn component_failed(&self, error: &ComponentInitError) {
        (**self).component_failed(error);
    }

    fn dispatcher_ready(&self, components: usize, models_loaded: usize) {
        (**self).dispatcher_ready(components, models_loaded);
    }

    fn dispatcher_failed(&self, error: &InitialisationError) {
        (**self).dispatcher_failed(error);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting daemon bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            socket = %config.daemon_socket(),
            log_filter = %config.log_filter(),
            log_format = %config.log_format(),
            request_timeout_ms = config.request_timeout_ms,
            max_in_flight = config.max_in_flight(),
            "daemon bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "daemon bootstrap failed"
        );
    }

    fn component_initialising(&self, component: &str) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "component_initialising",
            component,
            "initialising component"
        );
    }

    fn component_ready(&self, component: &str) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "component_ready",
            component,
            "component ready"
        );
    }

    fn component_failed(&self, error: &ComponentInitError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "component_failed",
            component = error.component(),
            message = error.message(),
            error = ?error,
            "component failed to initialise"
        );
    }

    fn dispatcher_ready(&self, components: usize, models_loaded: usize) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "dispatcher_ready",
            components,
            models_loaded,
            "dispatcher initialised"
        );
    }

    fn dispatcher_failed(&self, error: &InitialisationError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "dispatcher_failed",
            error = %error,
            "dispatcher initialisation failed"
        );
    }
}
