//! Outbound transport to origin servers.
//!
//! The interceptor only needs one round trip per request; pooling,
//! DNS and connection reuse belong to the transport implementation.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use thiserror::Error;

/// Opaque round-trip failure (unreachable origin, DNS, reset, bad framing).
#[derive(Debug, Error)]
#[error("outbound round trip failed: {0}")]
pub struct TransportError(#[source] pub Box<dyn std::error::Error + Send + Sync>);

/// Performs a single HTTP exchange with an origin.
#[async_trait]
pub trait OutboundTransport: Send + Sync {
    async fn round_trip(&self, request: Request<Body>) -> Result<Response<Body>, TransportError>;
}

/// Pooled HTTP/1 client. Does not follow redirects.
#[derive(Clone)]
pub struct HyperTransport {
    client: Client<HttpConnector, Body>,
}

impl HyperTransport {
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client }
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutboundTransport for HyperTransport {
    async fn round_trip(&self, request: Request<Body>) -> Result<Response<Body>, TransportError> {
        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| TransportError(Box::new(e)))?;
        Ok(response.map(Body::new))
    }
}
