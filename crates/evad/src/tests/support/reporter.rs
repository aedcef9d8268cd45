//! Test double for [`HealthReporter`] that records structured events for
//! assertions.

use std::sync::Mutex;

use eva_config::Config;

use crate::bootstrap::BootstrapError;
use crate::components::ComponentInitError;
use crate::dispatch::InitialisationError;
use crate::health::HealthReporter;

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum HealthEvent {
    BootstrapStarting,
    BootstrapSucceeded,
    BootstrapFailed(String),
    ComponentInitialising(String),
    ComponentReady(String),
    ComponentFailed { component: String, message: String },
    DispatcherReady { components: usize, models_loaded: usize },
    DispatcherFailed(String),
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub(crate) struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    pub(crate) fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn component_initialising(&self, component: &str) {
        self.record(HealthEvent::ComponentInitialising(component.to_owned()));
    }

    fn component_ready(&self, component: &str) {
        self.record(HealthEvent::ComponentReady(component.to_owned()));
    }

    fn component_failed(&self, error: &ComponentInitError) {
        self.record(HealthEvent::ComponentFailed {
            component: error.component().to_owned(),
            message: error.message().to_owned(),
        });
    }

    fn dispatcher_ready(&self, components: usize, models_loaded: usize) {
        self.record(HealthEvent::DispatcherReady {
            components,
            models_loaded,
        });
    }

    fn dispatcher_failed(&self, error: &InitialisationError) {
        self.record(HealthEvent::DispatcherFailed(error.to_string()));
    }
}
