//! Transport form of a request.
//!
//! Each JSONL line carries a [`WireRequest`] whose `data` and `options` are
//! JSON objects encoded as strings:
//!
//! ```json
//! {"method":"nlp_analyze_text","data":"{\"text\":\"hello world\"}","options":"{}","request_id":"r2"}
//! ```
//!
//! Decoding failures keep the caller's `request_id` whenever it can be read
//! from the line so the failure response can still be correlated.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{Payload, Request};

/// Envelope read from the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireRequest {
    /// Method name.
    pub method: String,
    /// JSON object encoded as a string; blank means empty.
    #[serde(default)]
    pub data: String,
    /// JSON object encoded as a string; blank means empty.
    #[serde(default)]
    pub options: String,
    /// Correlation id supplied by the caller.
    #[serde(default)]
    pub request_id: Option<String>,
}

/// Part of the envelope that failed to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireField {
    /// The JSONL line itself.
    Envelope,
    /// The `data` string.
    Data,
    /// The `options` string.
    Options,
}

impl WireField {
    /// Field name as it appears on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Envelope => "request",
            Self::Data => "data",
            Self::Options => "options",
        }
    }
}

impl fmt::Display for WireField {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Malformed input at the transport boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("malformed {field}: {message}")]
pub struct TransportParseError {
    request_id: String,
    field: WireField,
    message: String,
}

impl TransportParseError {
    /// Builds a parse error for the given correlation id.
    #[must_use]
    pub fn new(request_id: impl Into<String>, field: WireField, message: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            field,
            message: message.into(),
        }
    }

    /// Correlation id to use in the failure response.
    #[must_use]
    pub fn request_id(&self) -> &str {
        self.request_id.as_str()
    }

    /// Field that failed to decode.
    #[must_use]
    pub const fn field(&self) -> WireField {
        self.field
    }
}

impl WireRequest {
    /// Decodes the envelope into a [`Request`].
    ///
    /// `fallback_id` is called only when the envelope has no request id.
    ///
    /// # Errors
    ///
    /// Returns [`TransportParseError`] when `data` or `options` is not a JSON
    /// object.
    pub fn decode(self, fallback_id: impl FnOnce() -> String) -> Result<Request, TransportParseError> {
        let request_id = self.request_id.unwrap_or_else(fallback_id);
        let data = match parse_payload(&self.data) {
            Ok(data) => data,
            Err(message) => return Err(TransportParseError::new(request_id, WireField::Data, message)),
        };
        let options = match parse_payload(&self.options) {
            Ok(options) => options,
            Err(message) => {
                return Err(TransportParseError::new(
                    request_id,
                    WireField::Options,
                    message,
                ));
            }
        };
        Ok(Request::new(self.method, request_id)
            .with_data(data)
            .with_options(options))
    }
}

/// Decodes one JSONL line into a [`Request`].
///
/// Trailing whitespace, including the newline delimiter, is ignored.
///
/// # Errors
///
/// Returns [`TransportParseError`] when the line is not a valid envelope or
/// its payload strings are malformed. The error carries the line's
/// `request_id` when one can be recovered, otherwise the fallback id.
pub fn decode_line(
    line: &[u8],
    fallback_id: impl FnOnce() -> String,
) -> Result<Request, TransportParseError> {
    let trimmed = line.trim_ascii_end();
    if trimmed.is_empty() {
        return Err(TransportParseError::new(
            fallback_id(),
            WireField::Envelope,
            "empty request line",
        ));
    }

    match serde_json::from_slice::<WireRequest>(trimmed) {
        Ok(envelope) => envelope.decode(fallback_id),
        Err(error) => {
            let request_id = recover_request_id(trimmed).unwrap_or_else(fallback_id);
            Err(TransportParseError::new(
                request_id,
                WireField::Envelope,
                error.to_string(),
            ))
        }
    }
}

fn parse_payload(raw: &str) -> Result<Payload, String> {
    if raw.trim().is_empty() {
        return Ok(Payload::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("expected a JSON object, found {}", json_kind(&other))),
        Err(error) => Err(error.to_string()),
    }
}

fn recover_request_id(line: &[u8]) -> Option<String> {
    let value = serde_json::from_slice::<Value>(line).ok()?;
    value
        .get("request_id")
        .and_then(Value::as_str)
        .map(str::to_owned)
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn fallback() -> String {
        "transport-1".to_owned()
    }

    #[test]
    fn decodes_string_encoded_payloads() {
        let line = br#"{"method":"nlp_analyze_text","data":"{\"text\":\"hello world\"}","options":"{}","request_id":"r2"}"#;
        let request = decode_line(line, fallback).expect("decode");
        assert_eq!(request.method(), "nlp_analyze_text");
        assert_eq!(request.request_id(), "r2");
        assert_eq!(request.data().get("text"), Some(&json!("hello world")));
    }

    #[test]
    fn blank_payloads_decode_to_empty_maps() {
        let line = b"{\"method\":\"health_check\",\"request_id\":\"r1\"}\n";
        let request = decode_line(line, fallback).expect("decode");
        assert!(request.data().is_empty());
        assert!(request.options().is_empty());
    }

    #[test]
    fn missing_request_id_uses_fallback() {
        let request = decode_line(br#"{"method":"health_check"}"#, fallback).expect("decode");
        assert_eq!(request.request_id(), "transport-1");
    }

    #[rstest]
    #[case::malformed_data(r#"{"method":"m","data":"{not json","request_id":"r5"}"#, WireField::Data)]
    #[case::array_options(r#"{"method":"m","options":"[1,2]","request_id":"r5"}"#, WireField::Options)]
    #[case::bad_envelope(r#"{"method":7,"request_id":"r5"}"#, WireField::Envelope)]
    fn parse_failures_keep_request_id(#[case] line: &str, #[case] field: WireField) {
        let error = decode_line(line.as_bytes(), fallback).expect_err("should fail");
        assert_eq!(error.request_id(), "r5");
        assert_eq!(error.field(), field);
    }

    #[test]
    fn unparseable_line_uses_fallback_id() {
        let error = decode_line(b"not json", fallback).expect_err("should fail");
        assert_eq!(error.request_id(), "transport-1");
        assert!(error.to_string().starts_with("malformed request"));
    }
}
