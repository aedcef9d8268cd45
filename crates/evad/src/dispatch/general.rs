//! Fallback handler for methods without a component prefix.

use std::sync::Arc;
use std::time::Duration;

use eva_protocol::Payload;
use serde::Serialize;
use serde_json::Value;

use super::errors::DispatchError;

const GENERAL_SCOPE: &str = "general";

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    initialized: bool,
    models_loaded: usize,
    uptime: f64,
}

/// Snapshot of dispatcher state taken when a general request is routed.
///
/// The snapshot is owned so it can move into the request task.
#[derive(Debug, Clone)]
pub(crate) struct GeneralHandler {
    pub(crate) initialized: bool,
    pub(crate) models_loaded: usize,
    pub(crate) uptime: Duration,
    pub(crate) capabilities: Arc<Payload>,
}

impl GeneralHandler {
    pub(crate) fn handle(&self, method: &str) -> Result<Payload, DispatchError> {
        match method {
            "health_check" => Ok(self.health()),
            "get_capabilities" => Ok((*self.capabilities).clone()),
            other => Err(DispatchError::unknown_method(GENERAL_SCOPE, other)),
        }
    }

    fn health(&self) -> Payload {
        let health = Health {
            status: "healthy",
            initialized: self.initialized,
            models_loaded: self.models_loaded,
            uptime: self.uptime.as_secs_f64(),
        };
        match serde_json::to_value(health) {
            Ok(Value::Object(map)) => map,
            _ => Payload::new(),
        }
    }
}
