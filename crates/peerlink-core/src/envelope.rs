//! Wire envelope model for the peerlink protocol
//!
//! Messages are JSON values tagged with a `kind` field:
//! `{"kind":"request",...}` or `{"kind":"response",...}`.
//! The transport imposes no schema, so anything that does not decode as an
//! envelope is not an error; peers ignore unrecognized traffic and keep
//! listening.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Fixed identity of one endpoint.
///
/// Carried on every envelope so a peer can skip traffic it authored itself
/// (a broadcast-style channel echoes posts back to the poster), and so the
/// handshake direction is unambiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Client,
}

/// A named action sent by one peer, answered by zero or more responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    pub source: Role,
    pub action: String,
    #[serde(default)]
    pub payload: Value,
}

/// Answer to a single request.
///
/// `request_id` equals the `id` of the request it answers, and `request`
/// embeds the full original request for the caller's convenience. The
/// payload is an untyped JSON value on the wire; [`Response::into_typed`]
/// converts it at the API boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response<P = Value> {
    pub id: String,
    pub source: Role,
    pub request_id: String,
    pub request: Request,
    pub payload: P,
}

impl Response<Value> {
    /// Deserialize the payload into a concrete type.
    pub fn into_typed<P: DeserializeOwned>(self) -> serde_json::Result<Response<P>> {
        Ok(Response {
            id: self.id,
            source: self.source,
            request_id: self.request_id,
            request: self.request,
            payload: serde_json::from_value(self.payload)?,
        })
    }
}

/// The tagged union of message shapes exchanged over the transport
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Envelope {
    Request(Request),
    Response(Response),
}

impl Envelope {
    /// Role of the peer that authored this envelope
    pub fn source(&self) -> Role {
        match self {
            Envelope::Request(request) => request.source,
            Envelope::Response(response) => response.source,
        }
    }
}

/// Decode an inbound transport message.
///
/// Returns `None` when the message is not a recognized envelope; unrelated
/// traffic on a shared channel is expected and never surfaced as an error.
pub fn decode(value: &Value) -> Option<Envelope> {
    serde_json::from_value(value.clone()).ok()
}

/// Encode an envelope into a JSON value for the transport
pub fn encode(envelope: &Envelope) -> Result<Value> {
    Ok(serde_json::to_value(envelope)?)
}
