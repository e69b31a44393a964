//! CONNECT tunnel establishment.
//!
//! # Data Flow
//! ```text
//! Client ←──── raw bytes ────→ Proxy ←──── raw bytes ────→ Origin
//! ```
//!
//! # States
//! `Idle → Hijacked → Dialing → Tunneling → Closed`
//!
//! The origin is dialed before the success line goes out, so a failed dial
//! can still be answered with an HTTP error. After the success line the
//! connection has left HTTP and failures just close it.

use std::fmt;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use hyper::ext::ReasonPhrase;
use hyper::upgrade::{OnUpgrade, Upgraded};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tracing::Instrument;

use crate::error::ProxyError;
use crate::observability::metrics;

/// Reason phrase of the tunnel success line.
pub const CONNECTION_ESTABLISHED: &[u8] = b"Connection established";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelState {
    Idle,
    Hijacked,
    Dialing,
    Tunneling,
    Closed,
}

/// Host and port named by a CONNECT request target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetAuthority {
    pub host: String,
    pub port: u16,
}

impl TargetAuthority {
    /// Split on the last colon so IPv6 literals keep their inner colons.
    pub fn parse(authority: &str) -> Result<Self, ProxyError> {
        let invalid = || ProxyError::InvalidAuthority(authority.to_string());

        let (host, port) = authority.rsplit_once(':').ok_or_else(invalid)?;
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        if host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse::<u16>().map_err(|_| invalid())?;

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for TargetAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Handle a CONNECT request.
///
/// Returns the success response once the origin is dialed; the byte pump
/// runs on its own task after hyper hands over the raw connection.
pub async fn establish(mut request: Request<Body>) -> Result<Response, ProxyError> {
    let Some(on_upgrade) = request.extensions_mut().remove::<OnUpgrade>() else {
        tracing::warn!(state = ?TunnelState::Idle, "Connection cannot be hijacked");
        return Err(ProxyError::HijackUnsupported);
    };
    tracing::debug!(state = ?TunnelState::Hijacked, "Claimed client connection");

    let authority = request
        .uri()
        .authority()
        .map(|a| a.as_str().to_string())
        .unwrap_or_else(|| request.uri().to_string());
    let target = TargetAuthority::parse(&authority)?;

    tracing::debug!(state = ?TunnelState::Dialing, target = %target, "Dialing tunnel target");
    let origin = TcpStream::connect((target.host.as_str(), target.port))
        .await
        .map_err(|source| ProxyError::Dial {
            authority: target.to_string(),
            source,
        })?;

    let span = tracing::info_span!("tunnel", target = %target);
    tokio::spawn(
        async move {
            match on_upgrade.await {
                Ok(client) => pump(client, origin).await,
                Err(e) => tracing::warn!(error = %e, "Client connection was not handed over"),
            }
        }
        .instrument(span),
    );

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::OK;
    response
        .extensions_mut()
        .insert(ReasonPhrase::from_static(CONNECTION_ESTABLISHED));
    Ok(response)
}

/// Copy bytes both ways until either direction finishes.
async fn pump(client: Upgraded, origin: TcpStream) {
    metrics::record_tunnel_opened();
    tracing::debug!(state = ?TunnelState::Tunneling, "Tunnel open");

    let (mut client_read, mut client_write) = tokio::io::split(TokioIo::new(client));
    let (mut origin_read, mut origin_write) = origin.into_split();

    tokio::select! {
        res = tokio::io::copy(&mut client_read, &mut origin_write) => {
            if let Err(e) = res {
                tracing::debug!(error = %e, "Client to origin copy failed");
            }
        }
        res = tokio::io::copy(&mut origin_read, &mut client_write) => {
            if let Err(e) = res {
                tracing::debug!(error = %e, "Origin to client copy failed");
            }
        }
    }

    metrics::record_tunnel_closed();
    tracing::debug!(state = ?TunnelState::Closed, "Tunnel closed");
}
