//! Inbound request model.

use serde::{Deserialize, Serialize};

use crate::Payload;

/// A correlated call addressed to the dispatcher.
///
/// The method name is fixed at construction. The request id is echoed in the
/// matching [`crate::Response`]; keeping it unique among in-flight calls is
/// the caller's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    method: String,
    #[serde(default)]
    data: Payload,
    #[serde(default)]
    options: Payload,
    request_id: String,
}

/// Owned pieces of a [`Request`], used when the payload has to move into a
/// task.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestParts {
    /// Method name.
    pub method: String,
    /// Method arguments.
    pub data: Payload,
    /// Method options.
    pub options: Payload,
    /// Correlation id.
    pub request_id: String,
}

impl Request {
    /// Builds a request with empty `data` and `options`.
    #[must_use]
    pub fn new(method: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            data: Payload::new(),
            options: Payload::new(),
            request_id: request_id.into(),
        }
    }

    /// Replaces the request data.
    #[must_use]
    pub fn with_data(mut self, data: Payload) -> Self {
        self.data = data;
        self
    }

    /// Replaces the request options.
    #[must_use]
    pub fn with_options(mut self, options: Payload) -> Self {
        self.options = options;
        self
    }

    /// Method name used for routing.
    #[must_use]
    pub fn method(&self) -> &str {
        self.method.as_str()
    }

    /// Method arguments.
    #[must_use]
    pub fn data(&self) -> &Payload {
        &self.data
    }

    /// Method options.
    #[must_use]
    pub fn options(&self) -> &Payload {
        &self.options
    }

    /// Caller-supplied correlation id.
    #[must_use]
    pub fn request_id(&self) -> &str {
        self.request_id.as_str()
    }

    /// Consumes the request, returning its owned parts.
    #[must_use]
    pub fn into_parts(self) -> RequestParts {
        RequestParts {
            method: self.method,
            data: self.data,
            options: self.options,
            request_id: self.request_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn deserialises_with_missing_payloads() {
        let request: Request =
            serde_json::from_value(json!({"method": "health_check", "request_id": "r1"}))
                .expect("parse request");
        assert_eq!(request.method(), "health_check");
        assert!(request.data().is_empty());
        assert!(request.options().is_empty());
    }

    #[test]
    fn into_parts_preserves_fields() {
        let mut data = Payload::new();
        data.insert("text".to_owned(), json!("hello"));
        let parts = Request::new("nlp_analyze_text", "r2")
            .with_data(data.clone())
            .into_parts();
        assert_eq!(parts.method, "nlp_analyze_text");
        assert_eq!(parts.request_id, "r2");
        assert_eq!(parts.data, data);
    }
}
