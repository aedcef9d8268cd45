//! Error types for request dispatch.
//!
//! [`DispatchError`] covers everything that can go wrong with one request and
//! is converted into a failure response exactly once, at the dispatcher
//! boundary. [`InitialisationError`] and [`RegistrationError`] are fatal and
//! propagate to the process entry point.

use thiserror::Error;

use crate::components::{ComponentError, ComponentInitError};

/// Failures surfaced while serving a single request.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No handler accepts the method.
    #[error("unknown {scope} method '{method}'")]
    UnknownMethod {
        /// Component name, or `general` for the fallback handler.
        scope: String,
        /// Method name as received.
        method: String,
    },

    /// Arguments failed validation.
    #[error("invalid arguments for '{method}': {message}")]
    Validation {
        /// Method being handled.
        method: String,
        /// What was wrong.
        message: String,
    },

    /// A component route was requested before initialisation finished.
    #[error("dispatcher is not initialised; cannot serve '{method}'")]
    NotReady {
        /// Method that was refused.
        method: String,
    },

    /// Initialisation failed earlier; nothing can be served.
    #[error("dispatcher unavailable: initialisation failed")]
    Unavailable,

    /// The handler exceeded the request deadline.
    #[error("request '{method}' timed out after {timeout_ms} ms")]
    Timeout {
        /// Method that timed out.
        method: String,
        /// Configured deadline in milliseconds.
        timeout_ms: u128,
    },

    /// Unexpected failure (lock poisoned, task panicked).
    #[error("internal error: {message}")]
    Internal {
        /// Failure description.
        message: String,
    },
}

impl DispatchError {
    /// Creates an unknown method error.
    pub fn unknown_method(scope: impl Into<String>, method: impl Into<String>) -> Self {
        Self::UnknownMethod {
            scope: scope.into(),
            method: method.into(),
        }
    }

    /// Creates a not-ready error.
    pub fn not_ready(method: impl Into<String>) -> Self {
        Self::NotReady {
            method: method.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(method: impl Into<String>, timeout_ms: u128) -> Self {
        Self::Timeout {
            method: method.into(),
            timeout_ms,
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<ComponentError> for DispatchError {
    fn from(error: ComponentError) -> Self {
        match error {
            ComponentError::UnknownMethod { component, method } => {
                Self::unknown_method(component, method)
            }
            ComponentError::Validation { method, message } => Self::Validation { method, message },
            ComponentError::Internal { message } => Self::Internal { message },
        }
    }
}

/// Fatal failures raised by `Dispatcher::initialize`.
#[derive(Debug, Error)]
pub enum InitialisationError {
    /// A component could not initialise.
    #[error(transparent)]
    Component(#[from] ComponentInitError),

    /// The model catalog could not be loaded.
    #[error("failed to load model catalog: {message}")]
    Catalog {
        /// Failure description.
        message: String,
    },

    /// An earlier initialisation attempt failed; the dispatcher stays down.
    #[error("dispatcher initialisation already failed")]
    AlreadyFailed,
}

impl InitialisationError {
    /// Creates a catalog error.
    pub fn catalog(message: impl Into<String>) -> Self {
        Self::Catalog {
            message: message.into(),
        }
    }
}

/// Rejected component registrations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// Prefixes must be non-empty.
    #[error("component '{component}' was registered with an empty prefix")]
    EmptyPrefix {
        /// Component being registered.
        component: String,
    },

    /// Each component name may appear once.
    #[error("component '{component}' is already registered")]
    DuplicateComponent {
        /// Repeated component name.
        component: String,
    },

    /// Prefixes must be disjoint so routing stays unambiguous.
    #[error("prefix '{prefix}' overlaps existing prefix '{existing}'")]
    OverlappingPrefix {
        /// Prefix being registered.
        prefix: String,
        /// Registered prefix it collides with.
        existing: String,
    },
}
