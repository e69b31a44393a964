//! Request interception pipeline.
//!
//! ```text
//! inbound request
//!     → buffer body once, snapshot (CapturedRequest)
//!     → persist request            (failure: 500, origin never contacted)
//!     → strip Proxy-Connection, build outbound copy
//!     → OutboundTransport round trip
//!     → buffer response body, snapshot (CapturedResponse)
//!     → persist response           (failure: 500 even though origin answered)
//!     → relay headers, status, body
//! ```

use std::sync::Arc;
use std::time::Instant;

use axum::body::{to_bytes, Body};
use axum::http::Request;
use axum::response::Response;

use crate::config::LimitsConfig;
use crate::error::{AuditStage, ProxyError};
use crate::http::request::{build_outbound, CapturedRequest};
use crate::http::response::{relay, CapturedResponse};
use crate::http::transport::OutboundTransport;
use crate::observability::metrics;
use crate::persistence::{AuditSink, SinkError};

/// Captures, persists and forwards plain HTTP exchanges.
pub struct Interceptor {
    sink: Arc<dyn AuditSink>,
    transport: Arc<dyn OutboundTransport>,
    limits: LimitsConfig,
}

impl Interceptor {
    pub fn new(
        sink: Arc<dyn AuditSink>,
        transport: Arc<dyn OutboundTransport>,
        limits: LimitsConfig,
    ) -> Self {
        Self {
            sink,
            transport,
            limits,
        }
    }

    /// Run one exchange end to end.
    pub async fn intercept(&self, request: Request<Body>) -> Result<Response, ProxyError> {
        let start_time = Instant::now();
        let method = request.method().to_string();

        let result = self.forward(request).await;

        let status = match &result {
            Ok(response) => response.status(),
            Err(e) => e.status_code(),
        };
        metrics::record_request(&method, status.as_u16(), start_time);
        result
    }

    async fn forward(&self, request: Request<Body>) -> Result<Response, ProxyError> {
        let (parts, body) = request.into_parts();
        let body = to_bytes(body, self.limits.max_request_body_bytes)
            .await
            .map_err(|e| ProxyError::Capture(e.to_string()))?;

        let captured = CapturedRequest::capture(&parts, &body);
        tracing::debug!(
            method = %captured.method,
            path = %captured.path,
            "Captured request"
        );
        self.persist(AuditStage::Request, move |sink| sink.record_request(&captured))
            .await?;

        let outbound = build_outbound(parts, body)?;
        let response = self.transport.round_trip(outbound).await?;

        let (parts, body) = response.into_parts();
        let body = to_bytes(body, self.limits.max_response_body_bytes)
            .await
            .map_err(|e| ProxyError::BodyRead(e.to_string()))?;

        let captured = CapturedResponse::capture(&parts, &body);
        tracing::debug!(
            code = captured.code,
            body_len = body.len(),
            "Captured response"
        );
        self.persist(AuditStage::Response, move |sink| sink.record_response(&captured))
            .await?;

        Ok(relay(parts, body))
    }

    /// Run a sink write on the blocking pool and wait for it.
    async fn persist<F>(&self, stage: AuditStage, write: F) -> Result<(), ProxyError>
    where
        F: FnOnce(&dyn AuditSink) -> Result<(), SinkError> + Send + 'static,
    {
        let sink = Arc::clone(&self.sink);
        tokio::task::spawn_blocking(move || write(sink.as_ref()))
            .await
            .unwrap_or_else(|e| Err(SinkError::Unavailable(format!("sink task failed: {e}"))))
            .map_err(|source| ProxyError::Persistence { stage, source })
    }
}
