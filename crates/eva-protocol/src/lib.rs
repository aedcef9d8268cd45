//! Request and response model shared by the EVA daemon and its clients.
//!
//! A [`Request`] names a method, carries `data` and `options` mappings, and a
//! caller-supplied correlation id. Every request yields exactly one
//! [`Response`] echoing that id. Responses are constructed through
//! [`Response::success`] or [`Response::failure`], so a successful response
//! never carries an error and a failed one never carries a result.
//!
//! The [`wire`] module describes the transport form, in which `data` and
//! `options` travel as JSON-encoded strings inside a JSONL envelope.

mod request;
mod response;
pub mod wire;

pub use self::request::{Request, RequestParts};
pub use self::response::{Response, ResponseInvariantError, ResponseMetadata};
pub use self::wire::{TransportParseError, WireField, WireRequest, decode_line};

/// Untyped JSON mapping used for request payloads, options and results.
pub type Payload = serde_json::Map<String, serde_json::Value>;
