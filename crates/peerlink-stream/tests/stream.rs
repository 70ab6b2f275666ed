//! End-to-end conversations over framed byte streams.

use std::sync::Arc;
use std::time::Duration;

use peerlink::{Endpoint, Role};
use peerlink_stream::StreamTransport;
use serde_json::{Value, json};

const HANDSHAKE: &str = "handshake";

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn wait_ready(endpoint: &Endpoint) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while !endpoint.ready() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("endpoint never became ready");
}

fn duplex_pair() -> (Endpoint, Endpoint) {
    let (near, far) = tokio::io::duplex(64 * 1024);
    let (near_r, near_w) = tokio::io::split(near);
    let (far_r, far_w) = tokio::io::split(far);

    let host = Endpoint::new(
        Arc::new(StreamTransport::new(near_r, near_w)),
        Role::Host,
        HANDSHAKE,
    );
    let client = Endpoint::new(
        Arc::new(StreamTransport::new(far_r, far_w)),
        Role::Client,
        HANDSHAKE,
    );
    (host, client)
}

#[tokio::test]
async fn duplex_round_trip() {
    init_tracing();
    let (host, client) = duplex_pair();
    host.receive("echo", |request| request.payload.clone());

    wait_ready(&host).await;

    let response = client.send::<Value>("echo", json!({"n": 1})).await.unwrap();
    assert_eq!(response.payload, json!({"n": 1}));
}

#[tokio::test]
async fn duplex_host_to_client() {
    init_tracing();
    let (host, client) = duplex_pair();
    client.receive("notify", |_request| "seen");

    // Host may send before its handshake arrives; the request queues and
    // flushes once the client announces itself.
    let response = host.send::<String>("notify", "hello").await.unwrap();
    assert_eq!(response.payload, "seen");
    assert!(host.ready());
}

#[tokio::test]
async fn tcp_round_trip() {
    init_tracing();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (connected, accepted) = tokio::join!(tokio::net::TcpStream::connect(addr), listener.accept());
    let client_stream = connected.unwrap();
    let (host_stream, _) = accepted.unwrap();

    let host = Endpoint::new(
        Arc::new(StreamTransport::from_tcp(host_stream)),
        Role::Host,
        HANDSHAKE,
    );
    host.receive("sum", |request| {
        request
            .payload
            .as_array()
            .map(|ns| ns.iter().filter_map(Value::as_i64).sum::<i64>())
    });

    let client = Endpoint::new(
        Arc::new(StreamTransport::from_tcp(client_stream)),
        Role::Client,
        HANDSHAKE,
    );

    wait_ready(&host).await;

    let response = client.send::<i64>("sum", json!([1, 2, 3])).await.unwrap();
    assert_eq!(response.payload, 6);
}

#[cfg(unix)]
#[tokio::test]
async fn unix_socket_round_trip() {
    init_tracing();
    let (host_stream, client_stream) = tokio::net::UnixStream::pair().unwrap();

    let host = Endpoint::new(
        Arc::new(StreamTransport::from_unix(host_stream)),
        Role::Host,
        HANDSHAKE,
    );
    host.receive("whoami", |request| request.source);

    let client = Endpoint::new(
        Arc::new(StreamTransport::from_unix(client_stream)),
        Role::Client,
        HANDSHAKE,
    );

    wait_ready(&host).await;

    let response = client.send::<Role>("whoami", ()).await.unwrap();
    assert_eq!(response.payload, Role::Client);
}
