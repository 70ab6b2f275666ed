//! The protocol endpoint: readiness negotiation, outbound queueing,
//! request/response correlation, and inbound dispatch.
//!
//! All protocol state lives in a background dispatcher task that owns the
//! transport subscription. Public methods talk to it over an unbounded
//! command channel, so there is no lock shared between the caller and the
//! message path; only the handler registry is a shared map, because
//! registrations must take effect synchronously.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use peerlink_core::{Envelope, LinkError, Request, Response, Result, Role, decode, encode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, warn};

use crate::transport::Transport;

/// Prefix for generated message identifiers.
///
/// Uniqueness only matters within one endpoint's lifetime: a response is
/// matched by its sender's own waiter, never by a global lookup.
const ID_PREFIX: &str = "msg-";

type HandlerFn = dyn Fn(&Request) -> serde_json::Result<Value> + Send + Sync;
type HandlerMap = HashMap<String, Vec<Arc<HandlerFn>>>;

/// An outbound request paired with the waiter for its response.
struct Outbound {
    request: Request,
    reply: oneshot::Sender<Response>,
}

/// One side of the two-peer request/response protocol.
///
/// Construct one per role over a shared [`Transport`]; both peers must use
/// the same handshake action name. Clones are cheap handles onto the same
/// endpoint, which is how one is moved into a spawned task.
///
/// Requires a running tokio runtime: construction spawns the dispatcher
/// task holding the transport subscription. There is no teardown; the
/// subscription lives until every handle is dropped.
#[derive(Clone)]
pub struct Endpoint {
    role: Role,
    ready: Arc<AtomicBool>,
    counter: Arc<AtomicU64>,
    handlers: Arc<Mutex<HandlerMap>>,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl Endpoint {
    /// Create one side of the protocol on `transport`.
    ///
    /// The host starts not ready and buffers outbound requests until it
    /// observes the client's handshake; the client is ready immediately
    /// and announces itself by posting one handshake request.
    pub fn new(transport: Arc<dyn Transport>, role: Role, handshake: impl Into<String>) -> Self {
        let handshake = handshake.into();
        let ready = Arc::new(AtomicBool::new(role == Role::Client));
        let counter = Arc::new(AtomicU64::new(0));
        let handlers: Arc<Mutex<HandlerMap>> = Arc::new(Mutex::new(HashMap::new()));
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        let inbound = transport.subscribe();
        let dispatcher = Dispatcher {
            transport: transport.clone(),
            role,
            handshake: handshake.clone(),
            ready: ready.clone(),
            counter: counter.clone(),
            handlers: handlers.clone(),
            queue: Vec::new(),
            waiters: HashMap::new(),
        };
        tokio::spawn(dispatcher.run(outbound_rx, inbound));

        if role == Role::Client {
            // Announce liveness so the host can flush its queue. Nothing
            // ever answers a handshake, so no waiter is registered for it.
            let request = Request {
                id: next_id(&counter),
                source: role,
                action: handshake,
                payload: Value::Null,
            };
            match encode(&Envelope::Request(request)) {
                Ok(value) => transport.post(value),
                Err(e) => error!("failed to encode handshake: {}", e),
            }
        }

        Self {
            role,
            ready,
            counter,
            handlers,
            outbound,
        }
    }

    /// Send `action` with `payload` and wait for the first matching response.
    ///
    /// Every call gets a fresh identifier and its own waiter, so any number
    /// of sends may be outstanding at once and answered in any order. There
    /// is no timeout: if the peer never answers, the future pends forever —
    /// callers needing liveness wrap this in their own timeout.
    pub async fn send<P>(&self, action: &str, payload: impl Serialize) -> Result<Response<P>>
    where
        P: DeserializeOwned,
    {
        let payload = serde_json::to_value(payload)?;
        let request = Request {
            id: next_id(&self.counter),
            source: self.role,
            action: action.to_string(),
            payload,
        };
        debug!("[{:?}] sending {:?} as {}", self.role, action, request.id);

        let (reply, response) = oneshot::channel();
        self.outbound
            .send(Outbound { request, reply })
            .map_err(|_| LinkError::ChannelClosed)?;

        let response = response.await.map_err(|_| LinkError::ChannelClosed)?;
        Ok(response.into_typed()?)
    }

    /// Register a handler for `action`; chainable.
    ///
    /// Multiple registrations for one action all run, in registration
    /// order, each producing its own response. Requests for actions with
    /// no handler are silently ignored — registration is normally
    /// asymmetric across the two roles.
    pub fn receive<R, F>(&self, action: &str, handler: F) -> &Self
    where
        R: Serialize,
        F: Fn(&Request) -> R + Send + Sync + 'static,
    {
        let handler: Arc<HandlerFn> = Arc::new(move |request| serde_json::to_value(handler(request)));
        self.handlers
            .lock()
            .expect("handler registry poisoned")
            .entry(action.to_string())
            .or_default()
            .push(handler);
        self
    }

    /// Whether this endpoint may transmit immediately.
    ///
    /// Hosts start out not ready and flip once the client's handshake
    /// arrives; clients are ready from construction. One-way, never reset.
    pub fn ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// This endpoint's role.
    pub fn role(&self) -> Role {
        self.role
    }
}

fn next_id(counter: &AtomicU64) -> String {
    format!("{ID_PREFIX}{}", counter.fetch_add(1, Ordering::Relaxed))
}

/// Background task owning all protocol state.
struct Dispatcher {
    transport: Arc<dyn Transport>,
    role: Role,
    handshake: String,
    ready: Arc<AtomicBool>,
    counter: Arc<AtomicU64>,
    handlers: Arc<Mutex<HandlerMap>>,
    /// Requests accumulated while not ready, flushed once in send order.
    queue: Vec<Request>,
    /// Pending waiters keyed by request id; an entry is removed when the
    /// first matching response arrives, so later fan-out responses for the
    /// same request find no waiter.
    waiters: HashMap<String, oneshot::Sender<Response>>,
}

impl Dispatcher {
    async fn run(
        mut self,
        mut outbound: mpsc::UnboundedReceiver<Outbound>,
        mut inbound: broadcast::Receiver<Value>,
    ) {
        loop {
            tokio::select! {
                out = outbound.recv() => {
                    match out {
                        Some(out) => self.handle_outbound(out),
                        None => {
                            // Every endpoint handle dropped
                            debug!("command channel closed, dispatcher exiting");
                            break;
                        }
                    }
                }

                msg = inbound.recv() => {
                    match msg {
                        Ok(raw) => self.handle_inbound(&raw),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            // Equivalent to transport loss, which is best-effort anyway
                            warn!("inbound subscription lagged, {} message(s) skipped", skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            debug!("transport closed, dispatcher exiting");
                            break;
                        }
                    }
                }
            }
        }
    }

    fn handle_outbound(&mut self, out: Outbound) {
        // Waiter first, then transmit: the response cannot race past its
        // own request.
        self.waiters.insert(out.request.id.clone(), out.reply);
        if self.ready.load(Ordering::Acquire) {
            self.post(&Envelope::Request(out.request));
        } else {
            self.queue.push(out.request);
        }
    }

    fn handle_inbound(&mut self, raw: &Value) {
        // Unrecognized traffic, or our own posts echoed back by the channel
        let Some(envelope) = decode(raw) else { return };
        if envelope.source() == self.role {
            return;
        }

        match envelope {
            Envelope::Request(request) => {
                if request.action == self.handshake {
                    self.mark_ready();
                } else {
                    self.dispatch(&request);
                }
            }
            Envelope::Response(response) => {
                // First match wins; anything else falls through silently
                if let Some(reply) = self.waiters.remove(&response.request_id) {
                    let _ = reply.send(response);
                }
            }
        }
    }

    fn mark_ready(&mut self) {
        self.ready.store(true, Ordering::Release);
        // A repeated handshake re-flushes an empty queue, which is harmless
        let flushed = std::mem::take(&mut self.queue);
        debug!("[{:?}] peer handshake received, flushing {} queued request(s)", self.role, flushed.len());
        for request in flushed {
            self.post(&Envelope::Request(request));
        }
    }

    fn dispatch(&mut self, request: &Request) {
        let handlers = {
            let registry = self.handlers.lock().expect("handler registry poisoned");
            match registry.get(&request.action) {
                Some(handlers) => handlers.clone(),
                None => {
                    // Normal: the action may only be registered on the other role
                    debug!("[{:?}] no handler for {:?}, ignoring", self.role, request.action);
                    return;
                }
            }
        };

        // Registry lock released above: a handler may itself register
        // handlers or send requests.
        for handler in handlers {
            let payload = match handler(request) {
                Ok(payload) => payload,
                Err(e) => {
                    error!("[{:?}] handler for {:?} returned unserializable payload: {}", self.role, request.action, e);
                    continue;
                }
            };
            let response = Response {
                id: next_id(&self.counter),
                source: self.role,
                request_id: request.id.clone(),
                request: request.clone(),
                payload,
            };
            self.post(&Envelope::Response(response));
        }
    }

    fn post(&self, envelope: &Envelope) {
        match encode(envelope) {
            Ok(value) => self.transport.post(value),
            Err(e) => error!("[{:?}] failed to encode envelope: {}", self.role, e),
        }
    }
}
