//! Prefix routing table for capability components.
//!
//! The registry is assembled once through [`ComponentRegistry::builder`] and
//! is immutable afterwards. Prefixes must be disjoint: a prefix that is a
//! prefix of another registered one is rejected, so a method name can only
//! ever match a single component. Lookup still picks the longest matching
//! prefix, which keeps routing deterministic without relying on
//! registration order.

use std::fmt;
use std::sync::Arc;

use eva_protocol::Payload;
use serde_json::Value;

use crate::components::{
    CapabilityComponent, DataAnalyzer, ModelTrainer, NeuralEngine, NlpProcessor,
};

use super::errors::RegistrationError;

/// A component together with the method prefix it owns.
#[derive(Clone)]
pub struct RegisteredComponent {
    prefix: String,
    component: Arc<dyn CapabilityComponent>,
}

impl RegisteredComponent {
    /// Method prefix, e.g. `nlp_`.
    #[must_use]
    pub fn prefix(&self) -> &str {
        self.prefix.as_str()
    }

    /// Component name used for capability aggregation.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.component.name()
    }

    /// Shared handle to the component.
    #[must_use]
    pub fn component(&self) -> &Arc<dyn CapabilityComponent> {
        &self.component
    }
}

impl fmt::Debug for RegisteredComponent {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RegisteredComponent")
            .field("prefix", &self.prefix)
            .field("name", &self.name())
            .finish()
    }
}

/// Immutable prefix-to-component table.
#[derive(Clone, Debug, Default)]
pub struct ComponentRegistry {
    entries: Vec<RegisteredComponent>,
}

impl ComponentRegistry {
    /// Starts an empty registration.
    #[must_use]
    pub fn builder() -> ComponentRegistryBuilder {
        ComponentRegistryBuilder::default()
    }

    /// Registry with the four built-in components in their canonical order.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError`] if the built-in prefixes collide.
    pub fn standard() -> Result<Self, RegistrationError> {
        Ok(Self::builder()
            .register("nlp_", Arc::new(NlpProcessor::new()))?
            .register("ml_", Arc::new(ModelTrainer::new()))?
            .register("data_", Arc::new(DataAnalyzer::new()))?
            .register("neural_", Arc::new(NeuralEngine::new()))?
            .build())
    }

    /// Component owning the longest prefix of `method`, if any.
    #[must_use]
    pub fn lookup(&self, method: &str) -> Option<&RegisteredComponent> {
        self.entries
            .iter()
            .filter(|entry| method.starts_with(entry.prefix()))
            .max_by_key(|entry| entry.prefix.len())
    }

    /// Registered components in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredComponent> {
        self.entries.iter()
    }

    /// Number of registered components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Capability tags keyed by component name.
    #[must_use]
    pub fn capabilities(&self) -> Payload {
        self.entries
            .iter()
            .map(|entry| {
                let tags = entry
                    .component
                    .capabilities()
                    .iter()
                    .map(|tag| Value::from(*tag))
                    .collect();
                (entry.name().to_owned(), Value::Array(tags))
            })
            .collect()
    }
}

/// Accumulates registrations and validates each one as it is added.
#[derive(Default)]
pub struct ComponentRegistryBuilder {
    entries: Vec<RegisteredComponent>,
}

impl ComponentRegistryBuilder {
    /// Adds `component` under `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError`] for an empty prefix, a repeated component
    /// name, or a prefix overlapping one already registered.
    pub fn register(
        mut self,
        prefix: impl Into<String>,
        component: Arc<dyn CapabilityComponent>,
    ) -> Result<Self, RegistrationError> {
        let prefix = prefix.into();
        let name = component.name();
        if prefix.is_empty() {
            return Err(RegistrationError::EmptyPrefix {
                component: name.to_owned(),
            });
        }
        if self.entries.iter().any(|entry| entry.name() == name) {
            return Err(RegistrationError::DuplicateComponent {
                component: name.to_owned(),
            });
        }
        if let Some(existing) = self.entries.iter().find(|entry| {
            entry.prefix.starts_with(prefix.as_str()) || prefix.starts_with(entry.prefix())
        }) {
            return Err(RegistrationError::OverlappingPrefix {
                prefix,
                existing: existing.prefix.clone(),
            });
        }

        self.entries.push(RegisteredComponent { prefix, component });
        Ok(self)
    }

    /// Freezes the table.
    #[must_use]
    pub fn build(self) -> ComponentRegistry {
        ComponentRegistry {
            entries: self.entries,
        }
    }
}

impl fmt::Debug for ComponentRegistryBuilder {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ComponentRegistryBuilder")
            .field("entries", &self.entries)
            .finish()
    }
}
