//! HTTP server setup.
//!
//! # Responsibilities
//! - Accept connections and serve each on its own task
//! - Speak HTTP/1.x with upgrades enabled so CONNECT can be hijacked
//! - Hand every request to the dispatcher
//! - Stop accepting on shutdown and drain for a bounded time

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tracing::Instrument;

use crate::config::ProxyConfig;
use crate::http::intercept::Interceptor;
use crate::http::transport::OutboundTransport;
use crate::lifecycle::ShutdownSignal;
use crate::net::{ConnectionTracker, Listener, ListenerError};
use crate::persistence::AuditSink;
use crate::routing::router::{serve_request, Dispatcher};

/// HTTP server for the forward proxy.
pub struct ProxyServer {
    dispatcher: Dispatcher,
    tracker: ConnectionTracker,
    config: ProxyConfig,
}

impl ProxyServer {
    /// Create a server from its configuration and collaborators.
    pub fn new(
        config: ProxyConfig,
        sink: Arc<dyn AuditSink>,
        transport: Arc<dyn OutboundTransport>,
    ) -> Self {
        let interceptor = Interceptor::new(sink, transport, config.limits.clone());
        Self {
            dispatcher: Dispatcher::new(Arc::new(interceptor)),
            tracker: ConnectionTracker::new(),
            config,
        }
    }

    /// Accept connections until shutdown is signalled.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), ListenerError> {
        let addr = listener.local_addr().map_err(ListenerError::Bind)?;
        tracing::info!(address = %addr, "HTTP server starting");

        loop {
            let (stream, peer) = tokio::select! {
                _ = shutdown.recv() => break,
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        continue;
                    }
                },
            };
            self.spawn_connection(stream, peer);
        }

        let grace = Duration::from_secs(self.config.shutdown.grace_secs);
        tracing::info!(
            active_connections = self.tracker.active_count(),
            grace_secs = grace.as_secs(),
            "Draining connections"
        );
        if tokio::time::timeout(grace, self.tracker.wait_idle()).await.is_err() {
            tracing::warn!(
                active_connections = self.tracker.active_count(),
                "Grace period elapsed with connections still open"
            );
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream, peer: std::net::SocketAddr) {
        let guard = self.tracker.track();
        let span = tracing::info_span!("connection", connection_id = %guard.id(), peer = %peer);
        let dispatcher = self.dispatcher.clone();

        tokio::spawn(
            async move {
                let service = service_fn(move |request: Request<Incoming>| {
                    serve_request(dispatcher.clone(), request.map(Body::new))
                });

                // The CONNECT success line must carry no headers; relayed
                // responses keep the origin's own `date`.
                if let Err(e) = http1::Builder::new()
                    .preserve_header_case(true)
                    .title_case_headers(true)
                    .auto_date_header(false)
                    .serve_connection(TokioIo::new(stream), service)
                    .with_upgrades()
                    .await
                {
                    tracing::debug!(error = %e, "Connection ended with error");
                }
                drop(guard);
            }
            .instrument(span),
        );
    }
}
