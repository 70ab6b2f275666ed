//! # peerlink-stream
//!
//! [`Transport`] implementation over any byte stream: TCP, Unix domain
//! sockets, or in-memory duplex pipes. Messages travel as length-prefixed
//! JSON frames, pumped by background reader and writer tasks.
//!
//! Unlike the in-process bus, a stream is point-to-point: a poster never
//! observes its own messages, subscribers see only what the remote peer
//! sent. The endpoint's self-filtering is simply a no-op here.

pub mod frame;

use peerlink::Transport;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, warn};

pub use frame::{FrameRead, FrameWrite, MAX_FRAME_LEN};

/// Point-to-point transport over the two halves of a byte stream.
///
/// Construct the endpoint (which subscribes) before yielding to the
/// runtime; frames arriving while nothing is subscribed are dropped as
/// no-listener traffic.
pub struct StreamTransport {
    outbound: mpsc::UnboundedSender<Value>,
    inbound: broadcast::Sender<Value>,
}

impl StreamTransport {
    /// Spawn reader and writer pumps over a split stream.
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (inbound, _) = broadcast::channel(64);

        tokio::spawn(writer_task(writer, outbound_rx));
        tokio::spawn(reader_task(reader, inbound.clone()));

        Self { outbound, inbound }
    }

    /// Convenience constructor for a connected TCP stream.
    pub fn from_tcp(stream: tokio::net::TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self::new(reader, writer)
    }

    /// Convenience constructor for a connected Unix socket.
    #[cfg(unix)]
    pub fn from_unix(stream: tokio::net::UnixStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self::new(reader, writer)
    }
}

impl Transport for StreamTransport {
    fn post(&self, message: Value) {
        // Fire-and-forget: a dead writer pump means the connection is gone
        if self.outbound.send(message).is_err() {
            warn!("stream writer gone, message dropped");
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<Value> {
        self.inbound.subscribe()
    }
}

/// Drains posted messages into the stream as JSON frames.
async fn writer_task<W>(mut writer: W, mut outbound: mpsc::UnboundedReceiver<Value>)
where
    W: AsyncWrite + Unpin + Send,
{
    while let Some(message) = outbound.recv().await {
        let data = match serde_json::to_vec(&message) {
            Ok(data) => data,
            Err(e) => {
                error!("failed to serialize outbound message: {}", e);
                continue;
            }
        };

        let preview: String = String::from_utf8_lossy(&data).chars().take(200).collect();
        debug!("[out] len={} json={}", data.len(), preview);

        if let Err(e) = writer.write_frame(&data).await {
            error!("writer task failed: {}", e);
            break;
        }
    }
    debug!("outbound channel closed, writer task exiting");
}

/// Forwards inbound frames to every subscriber.
async fn reader_task<R>(mut reader: R, inbound: broadcast::Sender<Value>)
where
    R: AsyncRead + Unpin + Send,
{
    loop {
        let data = match reader.read_frame().await {
            Ok(data) => data,
            Err(e) => {
                // EOF on a closed connection lands here too
                debug!("reader task exiting: {}", e);
                break;
            }
        };

        let preview: String = String::from_utf8_lossy(&data).chars().take(200).collect();
        debug!("[in] len={} json={}", data.len(), preview);

        match serde_json::from_slice::<Value>(&data) {
            Ok(message) => {
                // Ignore send errors (no subscribers)
                let _ = inbound.send(message);
            }
            Err(e) => error!("failed to parse inbound frame: {}", e),
        }
    }
}
