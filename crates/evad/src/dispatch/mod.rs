//! Request dispatch for the EVA daemon.
//!
//! Methods are routed by prefix to a [`CapabilityComponent`]; names that
//! match no prefix go to the general handler, which serves `health_check`
//! and `get_capabilities`. The [`Dispatcher`] owns the lifecycle, the model
//! catalog and the error boundary that turns every failure into a response.
//!
//! [`CapabilityComponent`]: crate::components::CapabilityComponent

mod catalog;
mod dispatcher;
mod errors;
mod general;
mod handler;
mod registry;
mod response;

pub use self::catalog::{CatalogEntry, DEFAULT_CATALOG, ModelCatalog};
pub use self::dispatcher::{Dispatcher, DispatcherSettings, Lifecycle};
pub use self::errors::{DispatchError, InitialisationError, RegistrationError};
pub(crate) use self::handler::DispatchConnectionHandler;
pub use self::registry::{ComponentRegistry, ComponentRegistryBuilder, RegisteredComponent};

pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
