//! # peerlink
//!
//! Promise-style request/response messaging between two peers — a "host"
//! and a "client" — sharing one asynchronous, fire-and-forget message
//! channel with no built-in correlation or readiness signaling.
//!
//! Each peer constructs an [`Endpoint`] over a [`Transport`]. Sending a
//! named action returns a future that resolves with the matching typed
//! response; registering a handler for an action answers the other peer's
//! requests. The host buffers outbound requests until the client announces
//! itself with a handshake, so neither side has to care which one came up
//! first.
//!
//! ```
//! use std::sync::Arc;
//! use peerlink::{Endpoint, LocalTransport, Role};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> peerlink::Result<()> {
//! let bus = Arc::new(LocalTransport::default());
//! let host = Endpoint::new(bus.clone(), Role::Host, "handshake");
//! let client = Endpoint::new(bus, Role::Client, "handshake");
//!
//! host.receive("ping", |_request| "pong");
//!
//! let response = client.send::<String>("ping", ()).await?;
//! assert_eq!(response.payload, "pong");
//! # Ok(())
//! # }
//! ```

pub mod endpoint;
pub mod transport;

pub use endpoint::Endpoint;
pub use peerlink_core::{Envelope, LinkError, Request, Response, Result, Role};
pub use transport::{LocalTransport, Transport};
