//! Error types raised by capability components.

use thiserror::Error;

/// Failures raised while a component handles a method.
#[derive(Debug, Error)]
pub enum ComponentError {
    /// The method is not in the component's method table.
    #[error("unknown {component} method '{method}'")]
    UnknownMethod {
        /// Component that rejected the method.
        component: &'static str,
        /// Method name as received.
        method: String,
    },

    /// Arguments failed to decode or a precondition was not met.
    #[error("invalid arguments for '{method}': {message}")]
    Validation {
        /// Method being handled.
        method: String,
        /// What was wrong with the arguments.
        message: String,
    },

    /// Unexpected failure inside the component (e.g. lock poisoned).
    #[error("internal error: {message}")]
    Internal {
        /// Failure description.
        message: String,
    },
}

impl ComponentError {
    /// Creates an unknown method error.
    pub fn unknown_method(component: &'static str, method: impl Into<String>) -> Self {
        Self::UnknownMethod {
            component,
            method: method.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            method: method.into(),
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Raised when a component cannot finish its setup.
///
/// Initialisation failures are fatal for the dispatcher.
#[derive(Debug, Error)]
#[error("{component} component failed to initialise: {message}")]
pub struct ComponentInitError {
    component: String,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ComponentInitError {
    /// Builds an error without an underlying source.
    #[must_use]
    pub fn new(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Builds an error that wraps an underlying source.
    #[must_use]
    pub fn with_source(
        component: impl Into<String>,
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            component: component.into(),
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Name of the component that failed.
    #[must_use]
    pub fn component(&self) -> &str {
        self.component.as_str()
    }

    /// Human-readable failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}
