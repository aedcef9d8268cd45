//! Default model catalog loaded during dispatcher initialisation.

use std::collections::HashSet;

use super::errors::InitialisationError;

/// One model advertised by the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Catalog key, e.g. `nlp_base`.
    pub key: &'static str,
    /// Component whose default model this is.
    pub component: &'static str,
    /// Model family.
    pub model_type: &'static str,
    /// Concrete model name.
    pub name: &'static str,
    /// Load status reported by health checks.
    pub status: &'static str,
    /// Capability tags served by the model.
    pub capabilities: &'static [&'static str],
}

/// Models loaded at startup.
pub const DEFAULT_CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        key: "nlp_base",
        component: "nlp",
        model_type: "transformer",
        name: "distilbert-base-uncased",
        status: "loaded",
        capabilities: &["text_classification", "embeddings", "sentiment"],
    },
    CatalogEntry {
        key: "ml_classifier",
        component: "ml",
        model_type: "sklearn",
        name: "random_forest",
        status: "loaded",
        capabilities: &["classification", "feature_importance"],
    },
];

/// Validated set of catalog entries.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    entries: Vec<CatalogEntry>,
}

impl ModelCatalog {
    /// Loads `entries`, rejecting blank or repeated keys.
    ///
    /// # Errors
    ///
    /// Returns [`InitialisationError::Catalog`] describing the first invalid
    /// entry.
    pub fn load(entries: &[CatalogEntry]) -> Result<Self, InitialisationError> {
        let mut keys = HashSet::new();
        for entry in entries {
            if entry.key.trim().is_empty() {
                return Err(InitialisationError::catalog("catalog entry has an empty key"));
            }
            if !keys.insert(entry.key) {
                return Err(InitialisationError::catalog(format!(
                    "duplicate catalog entry '{}'",
                    entry.key
                )));
            }
        }
        Ok(Self {
            entries: entries.to_vec(),
        })
    }

    /// Number of loaded models.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no models are loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Key of the first model registered for `component`.
    #[must_use]
    pub fn default_for(&self, component: &str) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|entry| entry.component == component)
            .map(|entry| entry.key)
    }
}
