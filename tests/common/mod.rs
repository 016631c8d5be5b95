//! Shared utilities for integration testing.
//!
//! Backends speak raw HTTP/1.1 over tokio sockets so tests see exactly what
//! the proxy put on the wire.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use ai_api_proxy::config::{ProxyConfig, RouteConfig};
use ai_api_proxy::net::Listener;
use ai_api_proxy::{HttpServer, Shutdown};

/// Raw request head (request line and headers) and body.
pub struct RawRequest {
    pub head: String,
    pub body: Vec<u8>,
}

/// Read one HTTP/1.1 request with an optional `Content-Length` body.
pub async fn read_request<R: AsyncRead + Unpin>(reader: &mut R) -> Option<RawRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = reader.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[head_end..].to_vec();
    while body.len() < content_length {
        let n = reader.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    Some(RawRequest { head, body })
}

/// Backend that answers every request with the raw request it received.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Some(request) = read_request(&mut socket).await else {
                    return;
                };
                let mut echo = request.head.into_bytes();
                echo.extend_from_slice(&request.body);

                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nX-Upstream: echo\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    echo.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&echo).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Backend that counts accepted connections and answers `200 ok`.
pub async fn start_counting_backend() -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepted);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                if read_request(&mut socket).await.is_some() {
                    let _ = socket
                        .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok")
                        .await;
                }
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, accepted)
}

/// Server-sent events backend.
///
/// Sends `data: <n>` events every `interval`; stops after `count` events when
/// given, otherwise streams until the peer goes away. The returned receiver
/// gets one message per connection the peer closed mid-stream.
pub async fn start_sse_backend(
    count: Option<usize>,
    interval: Duration,
) -> (SocketAddr, mpsc::UnboundedReceiver<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (closed_tx, closed_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let closed_tx = closed_tx.clone();
            tokio::spawn(async move {
                let (mut reader, mut writer) = socket.into_split();
                if read_request(&mut reader).await.is_none() {
                    return;
                }
                let head = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: max-age=60\r\nTransfer-Encoding: chunked\r\n\r\n";
                if writer.write_all(head.as_bytes()).await.is_err() {
                    let _ = closed_tx.send(());
                    return;
                }

                let mut sent = 0usize;
                let mut ticker = tokio::time::interval(interval);
                let mut scratch = [0u8; 512];
                loop {
                    if count.is_some_and(|count| sent >= count) {
                        let _ = writer.write_all(b"0\r\n\r\n").await;
                        return;
                    }
                    tokio::select! {
                        _ = ticker.tick() => {
                            let event = format!("data: {sent}\n\n");
                            let frame = format!("{:x}\r\n{}\r\n", event.len(), event);
                            if writer.write_all(frame.as_bytes()).await.is_err() {
                                let _ = closed_tx.send(());
                                return;
                            }
                            sent += 1;
                        }
                        read = reader.read(&mut scratch) => {
                            if matches!(read, Ok(0) | Err(_)) {
                                let _ = closed_tx.send(());
                                return;
                            }
                        }
                    }
                }
            });
        }
    });

    (addr, closed_rx)
}

/// An address nothing listens on.
pub async fn refused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Start the proxy on an ephemeral port with the given routes.
///
/// Keep the returned `Shutdown` alive for the duration of the test.
pub async fn start_proxy(routes: Vec<RouteConfig>) -> (SocketAddr, Shutdown) {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.listener.shutdown_grace_secs = 1;
    config.routes = routes;

    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config).unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown)
}

/// HTTP client that bypasses any system proxy and never reuses connections.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
