//! # peerlink-core
//!
//! Envelope model and error types for the peerlink protocol.
//!
//! This crate defines the wire shapes exchanged between the two peers:
//! - Request and response envelopes, tagged with a `kind` field
//! - The `Role` carried on every envelope (host or client)
//! - Decode/encode helpers that treat unrecognized traffic as ignorable
//!   rather than as a parse failure

pub mod envelope;
pub mod error;

pub use envelope::{Envelope, Request, Response, Role, decode, encode};
pub use error::{LinkError, Result};
