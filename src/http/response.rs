//! Origin response capture and relay.
//!
//! # Responsibilities
//! - Snapshot the origin response for the audit trail
//! - Rebuild the client-facing response from the buffered body
//!
//! # Design Decisions
//! - Bodies are fully buffered before anything is written to the client
//! - Relayed headers use last-write-wins collapsing, snapshot keeps the first
//! - Hop-by-hop headers are audited but never relayed; hyper re-frames the
//!   buffered body itself

use std::collections::BTreeMap;

use axum::body::{Body, Bytes};
use axum::http::response::Parts;
use axum::http::{header, HeaderMap, HeaderName};
use axum::response::Response;
use hyper::ext::ReasonPhrase;
use serde::{Deserialize, Serialize};

use crate::http::request::{first_header_values, PROXY_CONNECTION};

const KEEP_ALIVE: HeaderName = HeaderName::from_static("keep-alive");

/// Connection-scoped headers that describe the origin hop, not the message.
const HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    KEEP_ALIVE,
    PROXY_CONNECTION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Immutable audit snapshot of an origin response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedResponse {
    pub code: u16,
    /// Status line text as sent by the origin, e.g. `404 Not Found`.
    pub message: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl CapturedResponse {
    pub fn capture(parts: &Parts, body: &[u8]) -> Self {
        Self {
            code: parts.status.as_u16(),
            message: status_message(parts),
            headers: first_header_values(&parts.headers),
            body: String::from_utf8_lossy(body).into_owned(),
        }
    }
}

fn status_message(parts: &Parts) -> String {
    let reason = parts
        .extensions
        .get::<ReasonPhrase>()
        .map(|phrase| String::from_utf8_lossy(phrase.as_bytes()).into_owned())
        .or_else(|| parts.status.canonical_reason().map(str::to_string));

    match reason {
        Some(reason) => format!("{} {}", parts.status.as_u16(), reason),
        None => parts.status.as_u16().to_string(),
    }
}

/// Build the response written back to the client.
pub fn relay(parts: Parts, body: Bytes) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = parts.status;

    let listed = connection_listed(&parts.headers);
    let headers = response.headers_mut();
    for (name, value) in parts.headers.iter() {
        if HOP_BY_HOP.contains(name) || listed.contains(name) {
            continue;
        }
        headers.insert(name.clone(), value.clone());
    }

    response
}

/// Extra hop-by-hop names announced in the `Connection` header.
fn connection_listed(headers: &HeaderMap) -> Vec<HeaderName> {
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn parts(response: axum::http::Response<()>) -> Parts {
        response.into_parts().0
    }

    #[test]
    fn captures_status_headers_and_body() {
        let p = parts(
            axum::http::Response::builder()
                .status(404)
                .header("set-cookie", "a=1")
                .header("set-cookie", "b=2")
                .body(())
                .unwrap(),
        );
        let captured = CapturedResponse::capture(&p, b"missing");
        assert_eq!(captured.code, 404);
        assert_eq!(captured.message, "404 Not Found");
        assert_eq!(captured.headers["set-cookie"], "a=1");
        assert_eq!(captured.body, "missing");
    }

    #[test]
    fn custom_reason_phrase_is_preserved() {
        let p = parts(
            axum::http::Response::builder()
                .status(200)
                .extension(ReasonPhrase::from_static(b"Everything Fine"))
                .body(())
                .unwrap(),
        );
        assert_eq!(CapturedResponse::capture(&p, b"").message, "200 Everything Fine");
    }

    #[test]
    fn binary_body_captured_lossily() {
        let p = parts(axum::http::Response::builder().body(()).unwrap());
        let captured = CapturedResponse::capture(&p, &[0x66, 0x6f, 0xff]);
        assert_eq!(captured.body, "fo\u{fffd}");
    }

    #[tokio::test]
    async fn relay_copies_status_and_body_with_last_header() {
        let p = parts(
            axum::http::Response::builder()
                .status(201)
                .header("x-dup", "first")
                .header("x-dup", "second")
                .body(())
                .unwrap(),
        );
        let response = relay(p, Bytes::from_static(b"created"));
        assert_eq!(response.status(), StatusCode::CREATED);
        let values: Vec<_> = response.headers().get_all("x-dup").iter().collect();
        assert_eq!(values, vec!["second"]);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"created");
    }

    #[test]
    fn relay_drops_hop_by_hop_headers() {
        let p = parts(
            axum::http::Response::builder()
                .header("transfer-encoding", "chunked")
                .header("connection", "keep-alive, x-hop")
                .header("keep-alive", "timeout=5")
                .header("x-hop", "1")
                .header("x-kept", "1")
                .body(())
                .unwrap(),
        );
        let captured = CapturedResponse::capture(&p, b"hello");
        assert_eq!(captured.headers["transfer-encoding"], "chunked");

        let response = relay(p, Bytes::from_static(b"hello"));
        let names: Vec<_> = response.headers().keys().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["x-kept"]);
    }
}
