//! Outbound response model.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Payload;

/// Observability fields attached by the dispatcher to successful responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// Wall-clock time spent in the handler, in seconds.
    pub processing_time: f64,
    /// Model or network the request was served by.
    pub model_used: String,
}

/// Result of a dispatched [`crate::Request`].
///
/// `success == true` implies `error` is absent and `success == false`
/// implies `result` is absent. Both constructors and deserialisation uphold
/// this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ResponseFields")]
pub struct Response {
    request_id: String,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Payload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<ResponseMetadata>,
}

impl Response {
    /// Builds a successful response.
    #[must_use]
    pub fn success(
        request_id: impl Into<String>,
        result: Payload,
        metadata: ResponseMetadata,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            success: true,
            result: Some(result),
            error: None,
            metadata: Some(metadata),
        }
    }

    /// Builds a failed response carrying a human-readable message.
    #[must_use]
    pub fn failure(request_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            success: false,
            result: None,
            error: Some(error.into()),
            metadata: None,
        }
    }

    /// Correlation id copied from the request.
    #[must_use]
    pub fn request_id(&self) -> &str {
        self.request_id.as_str()
    }

    /// Whether the handler completed successfully.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.success
    }

    /// Handler output for successful responses.
    #[must_use]
    pub const fn result(&self) -> Option<&Payload> {
        self.result.as_ref()
    }

    /// Failure message for unsuccessful responses.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Dispatcher-computed metadata.
    #[must_use]
    pub const fn metadata(&self) -> Option<&ResponseMetadata> {
        self.metadata.as_ref()
    }
}

/// Raised when a serialised response violates the success/error invariant.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResponseInvariantError {
    /// A successful response carried an error message.
    #[error("successful response for '{request_id}' carries an error")]
    SuccessWithError {
        /// Offending correlation id.
        request_id: String,
    },
    /// A failed response carried a result.
    #[error("failed response for '{request_id}' carries a result")]
    FailureWithResult {
        /// Offending correlation id.
        request_id: String,
    },
}

#[derive(Deserialize)]
struct ResponseFields {
    request_id: String,
    success: bool,
    #[serde(default)]
    result: Option<Payload>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    metadata: Option<ResponseMetadata>,
}

impl TryFrom<ResponseFields> for Response {
    type Error = ResponseInvariantError;

    fn try_from(fields: ResponseFields) -> Result<Self, Self::Error> {
        let ResponseFields {
            request_id,
            success,
            result,
            error,
            metadata,
        } = fields;
        match (success, &result, &error) {
            (true, _, Some(_)) => Err(ResponseInvariantError::SuccessWithError { request_id }),
            (false, Some(_), _) => Err(ResponseInvariantError::FailureWithResult { request_id }),
            _ => Ok(Self {
                request_id,
                success,
                result,
                error,
                metadata,
            }),
        }
    }
}
