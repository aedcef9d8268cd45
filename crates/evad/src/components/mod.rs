//! Capability components served by the dispatcher.
//!
//! Each component owns one method prefix and a fixed method table. The
//! dispatcher picks the component by prefix; the component then matches the
//! full method name against its table and rejects anything else, so both
//! routing levels refuse unknown input on their own.
//!
//! Handlers decode their arguments into typed structs before doing any work.
//! Decoding failures become [`ComponentError::Validation`] naming the method.

mod analyzer;
mod engine;
mod errors;
mod nlp;
pub(crate) mod store;
mod trainer;

use async_trait::async_trait;
use eva_protocol::Payload;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use self::analyzer::DataAnalyzer;
pub use self::engine::NeuralEngine;
pub use self::errors::{ComponentError, ComponentInitError};
pub use self::nlp::NlpProcessor;
pub use self::trainer::ModelTrainer;

pub(crate) const COMPONENTS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::components");

/// Uniform contract implemented by every capability component.
#[async_trait]
pub trait CapabilityComponent: Send + Sync {
    /// Key used when aggregating capabilities, e.g. `nlp`.
    fn name(&self) -> &'static str;

    /// Prepares the component. Calling it again after success is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentInitError`] when setup cannot complete.
    async fn initialize(&self) -> Result<(), ComponentInitError>;

    /// Handles one method call.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::UnknownMethod`] for names outside
    /// [`Self::methods`], and [`ComponentError::Validation`] for bad input.
    async fn process(
        &self,
        method: &str,
        data: &Payload,
        options: &Payload,
    ) -> Result<Payload, ComponentError>;

    /// Capability tags in a stable order.
    fn capabilities(&self) -> &'static [&'static str];

    /// Exact method names this component accepts.
    fn methods(&self) -> &'static [&'static str];
}

/// Decodes a request payload into a handler's argument struct.
pub(crate) fn decode_args<T>(method: &str, payload: &Payload) -> Result<T, ComponentError>
where
    T: DeserializeOwned,
{
    serde_json::from_value(Value::Object(payload.clone()))
        .map_err(|error| ComponentError::validation(method, error.to_string()))
}

/// Serialises a handler result into a response payload.
pub(crate) fn into_payload<T>(result: &T) -> Result<Payload, ComponentError>
where
    T: Serialize,
{
    match serde_json::to_value(result) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ComponentError::internal("handler result is not an object")),
        Err(error) => Err(ComponentError::internal(format!(
            "failed to serialise handler result: {error}"
        ))),
    }
}

/// Fetches a required string id from the options payload.
pub(crate) fn required_id<'a>(
    method: &str,
    key: &str,
    id: Option<&'a str>,
) -> Result<&'a str, ComponentError> {
    id.filter(|value| !value.is_empty())
        .ok_or_else(|| ComponentError::validation(method, format!("'{key}' is required")))
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Args {
        #[serde(default)]
        epochs: Option<u32>,
    }

    #[test]
    fn decode_failures_name_the_method() {
        let mut payload = Payload::new();
        payload.insert("epochs".to_owned(), json!("many"));
        let error = decode_args::<Args>("neural_train", &payload).expect_err("decode should fail");
        assert!(error.to_string().contains("neural_train"));
    }

    #[test]
    fn missing_ids_are_validation_errors() {
        let error = required_id("ml_predict", "model_id", None).expect_err("missing id");
        assert!(matches!(error, ComponentError::Validation { .. }));
        assert!(error.to_string().contains("'model_id' is required"));
    }
}
