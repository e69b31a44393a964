//! Error taxonomy for the interception and tunnel paths.
//!
//! Every variant is terminal for the request or tunnel it occurs in.
//! Clients only ever see a fixed message; detail goes to the log.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::http::transport::TransportError;
use crate::observability::metrics;
use crate::persistence::SinkError;

/// Which side of an exchange an audit write belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStage {
    Request,
    Response,
}

impl AuditStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStage::Request => "request",
            AuditStage::Response => "response",
        }
    }
}

impl std::fmt::Display for AuditStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ProxyError {
    /// Inbound body could not be read for the audit snapshot.
    #[error("failed to capture inbound request: {0}")]
    Capture(String),

    #[error("failed to persist {stage}: {source}")]
    Persistence {
        stage: AuditStage,
        #[source]
        source: SinkError,
    },

    #[error("cannot build outbound request: {0}")]
    Construction(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to read origin response body: {0}")]
    BodyRead(String),

    #[error("connection cannot be hijacked")]
    HijackUnsupported,

    #[error("invalid CONNECT authority {0:?}")]
    InvalidAuthority(String),

    #[error("failed to dial {authority}: {source}")]
    Dial {
        authority: String,
        #[source]
        source: std::io::Error,
    },
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::InvalidAuthority(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn client_message(&self) -> &'static str {
        match self {
            ProxyError::Capture(_) => "Error reading request",
            ProxyError::Persistence { stage: AuditStage::Request, .. } => "Error saving request",
            ProxyError::Persistence { stage: AuditStage::Response, .. } => "Error saving response",
            ProxyError::Construction(_) => "Cannot create proxy request",
            ProxyError::Transport(_) => "Error sending proxy request",
            ProxyError::BodyRead(_) => "Error reading proxy response body",
            ProxyError::HijackUnsupported => "Connection cannot be tunneled",
            ProxyError::InvalidAuthority(_) => "CONNECT target must be host:port",
            ProxyError::Dial { .. } => "Error connecting to tunnel target",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        match &self {
            ProxyError::InvalidAuthority(_) => tracing::warn!(error = %self, "Rejected CONNECT"),
            ProxyError::Persistence { stage, .. } => {
                metrics::record_audit_failure(stage.as_str());
                tracing::error!(error = %self, "Audit write failed");
            }
            _ => tracing::error!(error = %self, "Proxy failure"),
        }
        (self.status_code(), self.client_message()).into_response()
    }
}
