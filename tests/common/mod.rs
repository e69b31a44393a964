//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use audit_proxy::http::request::CapturedRequest;
use audit_proxy::http::response::CapturedResponse;
use audit_proxy::http::{OutboundTransport, ProxyServer, TransportError};
use audit_proxy::lifecycle::Shutdown;
use audit_proxy::net::Listener;
use audit_proxy::persistence::{AuditSink, SinkError};
use audit_proxy::ProxyConfig;
use axum::body::Body;
use axum::http::{Request, Response};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Running proxy; shuts down when dropped.
pub struct TestProxy {
    pub addr: SocketAddr,
    shutdown: Shutdown,
}

impl TestProxy {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// reqwest client that sends every request through this proxy.
    pub fn client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .proxy(reqwest::Proxy::all(self.url()).unwrap())
            .pool_max_idle_per_host(0)
            .build()
            .unwrap()
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the proxy on an ephemeral loopback port.
pub async fn start_proxy(
    sink: Arc<dyn AuditSink>,
    transport: Arc<dyn OutboundTransport>,
) -> TestProxy {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.shutdown.grace_secs = 0;

    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();

    let server = ProxyServer::new(config, sink, transport);
    tokio::spawn(async move {
        let _ = server.run(listener, signal).await;
    });

    TestProxy { addr, shutdown }
}

/// In-process origin: answers `200 OK` with body `hello` and records requests.
#[derive(Default)]
pub struct StubTransport {
    chunked: bool,
    calls: AtomicUsize,
    seen: Mutex<Vec<(String, axum::http::HeaderMap)>>,
}

impl StubTransport {
    /// Same answer, but announced as `transfer-encoding: chunked`.
    pub fn chunked() -> Self {
        Self {
            chunked: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Target URI and headers of every forwarded request.
    pub fn seen(&self) -> Vec<(String, axum::http::HeaderMap)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl OutboundTransport for StubTransport {
    async fn round_trip(&self, request: Request<Body>) -> Result<Response<Body>, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((request.uri().to_string(), request.headers().clone()));
        let mut response = Response::builder()
            .status(200)
            .header("content-type", "text/plain")
            .header("x-origin", "stub");
        if self.chunked {
            response = response.header("transfer-encoding", "chunked");
        }
        Ok(response.body(Body::from("hello")).unwrap())
    }
}

/// Sink that keeps records in memory and can be told to fail either stage.
#[derive(Default)]
pub struct RecordingSink {
    fail_requests: bool,
    fail_responses: bool,
    requests: Mutex<Vec<CapturedRequest>>,
    responses: Mutex<Vec<CapturedResponse>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_requests() -> Self {
        Self {
            fail_requests: true,
            ..Self::default()
        }
    }

    pub fn failing_responses() -> Self {
        Self {
            fail_responses: true,
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn responses(&self) -> Vec<CapturedResponse> {
        self.responses.lock().unwrap().clone()
    }
}

impl AuditSink for RecordingSink {
    fn record_request(&self, request: &CapturedRequest) -> Result<(), SinkError> {
        if self.fail_requests {
            return Err(SinkError::Unavailable("requests table locked".into()));
        }
        self.requests.lock().unwrap().push(request.clone());
        Ok(())
    }

    fn record_response(&self, response: &CapturedResponse) -> Result<(), SinkError> {
        if self.fail_responses {
            return Err(SinkError::Unavailable("responses table locked".into()));
        }
        self.responses.lock().unwrap().push(response.clone());
        Ok(())
    }
}

/// Raw TCP origin that returns a fixed response and hands back the request head.
pub async fn start_recording_origin(
    response: &'static str,
) -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let head = read_head(&mut socket).await;
                let _ = tx.send(head);
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, rx)
}

/// Loopback echo origin. Counts accepted connections.
pub async fn start_echo_origin() -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    serve_echo(listener)
}

/// Echo origin on `[::1]`, or `None` when the host has no IPv6 loopback.
pub async fn start_ipv6_echo_origin() -> Option<(SocketAddr, Arc<AtomicUsize>)> {
    let listener = TcpListener::bind("[::1]:0").await.ok()?;
    Some(serve_echo(listener))
}

fn serve_echo(listener: TcpListener) -> (SocketAddr, Arc<AtomicUsize>) {
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let (mut reader, mut writer) = socket.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });

    (addr, accepted)
}

/// Read bytes up to and including the blank line ending an HTTP head.
pub async fn read_head<S: AsyncRead + Unpin>(stream: &mut S) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        match stream.read(&mut byte).await {
            Ok(0) | Err(_) => break,
            Ok(_) => head.push(byte[0]),
        }
    }
    String::from_utf8_lossy(&head).into_owned()
}
