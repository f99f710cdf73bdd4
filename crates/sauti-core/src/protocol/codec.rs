//! MessagePack framing for wire envelopes.
//!
//! Envelopes are encoded in named-map mode so every frame stays
//! self-describing; clients in other languages can decode them without a
//! schema.

use crate::error::{Error, Result};

use super::request::RequestEnvelope;
use super::response::ResponseEnvelope;

/// Decode one binary frame into a request envelope.
pub fn decode_request(bytes: &[u8]) -> Result<RequestEnvelope> {
    rmp_serde::from_slice(bytes).map_err(|e| Error::Codec(e.to_string()))
}

/// Encode one response envelope into a binary frame.
pub fn encode_response(envelope: &ResponseEnvelope) -> Result<Vec<u8>> {
    rmp_serde::to_vec_named(envelope).map_err(|e| Error::Codec(e.to_string()))
}
