//! Transport capability consumed by [`Endpoint`](crate::Endpoint)
//!
//! A transport is a best-effort message channel: `post` hands a message to
//! the channel with no delivery confirmation, and `subscribe` registers one
//! more inbound listener. Every subscriber observes every inbound message.
//! Whether a poster also observes its own messages depends on the channel —
//! a shared in-process bus echoes them back, a point-to-point stream does
//! not. Endpoints filter self-authored traffic either way.

use serde_json::Value;
use tokio::sync::broadcast;

/// Abstract message channel shared by the two peers.
pub trait Transport: Send + Sync {
    /// Hand a message to the channel, fire-and-forget.
    ///
    /// Best-effort: implementations log failures rather than surface them.
    fn post(&self, message: Value);

    /// Register one more inbound listener.
    fn subscribe(&self) -> broadcast::Receiver<Value>;
}

/// In-process broadcast bus, for two endpoints living in one process.
///
/// Every posted message is delivered to every subscriber, including the
/// poster's own endpoint — the same shape as a `postMessage`-style channel
/// shared by a host page and an embedded view.
#[derive(Clone)]
pub struct LocalTransport {
    bus: broadcast::Sender<Value>,
}

impl LocalTransport {
    /// Create a bus that buffers up to `capacity` undelivered messages
    /// per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (bus, _) = broadcast::channel(capacity);
        Self { bus }
    }
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self::new(64)
    }
}

impl Transport for LocalTransport {
    fn post(&self, message: Value) {
        // Ignore send errors (no subscribers)
        let _ = self.bus.send(message);
    }

    fn subscribe(&self) -> broadcast::Receiver<Value> {
        self.bus.subscribe()
    }
}
