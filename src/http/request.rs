//! Inbound request capture and outbound request construction.
//!
//! # Responsibilities
//! - Snapshot the inbound request for the audit trail
//! - Prepare the copy that is forwarded to the origin
//!
//! # Design Decisions
//! - The snapshot keeps the *first* value of a repeated header, query or
//!   form parameter; the forwarded copy keeps the *last* header value
//! - Query strings and bodies are forwarded byte-for-byte
//! - Inbound request snapshotted for auditing; modified copy forwarded

use std::collections::BTreeMap;

use axum::body::{Body, Bytes};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, HeaderName, Method, Request, Uri};
use serde::{Deserialize, Serialize};

use crate::error::ProxyError;

/// Hop-by-hop header that is stripped from the forwarded copy only.
pub const PROXY_CONNECTION: HeaderName = HeaderName::from_static("proxy-connection");

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Immutable audit snapshot of an inbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub get_params: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    pub cookies: BTreeMap<String, String>,
    pub post_params: BTreeMap<String, String>,
}

impl CapturedRequest {
    /// Build the snapshot from request parts and the already-buffered body.
    pub fn capture(parts: &Parts, body: &[u8]) -> Self {
        let get_params = parts
            .uri
            .query()
            .map(|query| first_values(query.as_bytes()))
            .unwrap_or_default();

        let post_params = if carries_form(parts) {
            first_values(body)
        } else {
            BTreeMap::new()
        };

        Self {
            method: parts.method.as_str().to_string(),
            path: parts.uri.path().to_string(),
            get_params,
            headers: first_header_values(&parts.headers),
            cookies: parse_cookies(&parts.headers),
            post_params,
        }
    }
}

/// Collapse a header map to one value per name, keeping the first.
pub fn first_header_values(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .keys()
        .filter_map(|name| {
            let value = headers.get(name)?;
            Some((
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            ))
        })
        .collect()
}

fn first_values(input: &[u8]) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    for (name, value) in url::form_urlencoded::parse(input) {
        params.entry(name.into_owned()).or_insert_with(|| value.into_owned());
    }
    params
}

/// Form bodies are only parsed for methods that carry them.
fn carries_form(parts: &Parts) -> bool {
    let method_has_form = matches!(parts.method, Method::POST | Method::PUT | Method::PATCH);
    let is_form = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| mime.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
        .unwrap_or(false);
    method_has_form && is_form
}

/// Parse every `Cookie` header. A repeated name overwrites earlier values.
pub fn parse_cookies(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut cookies = BTreeMap::new();
    for line in headers.get_all(header::COOKIE) {
        let Ok(line) = line.to_str() else { continue };
        for pair in line.split(';') {
            let Some((name, value)) = pair.trim().split_once('=') else {
                continue;
            };
            let name = name.trim();
            if !is_token(name) {
                continue;
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            cookies.insert(name.to_string(), value.to_string());
        }
    }
    cookies
}

fn is_token(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        })
}

/// Build the request forwarded to the origin.
///
/// Strips `Proxy-Connection`, resolves origin-form targets against the
/// `Host` header and copies headers with last-write-wins collapsing.
pub fn build_outbound(mut parts: Parts, body: Bytes) -> Result<Request<Body>, ProxyError> {
    parts.headers.remove(&PROXY_CONNECTION);

    let uri = absolute_target(&parts)?;

    let mut request = Request::builder()
        .method(parts.method.clone())
        .uri(uri)
        .body(Body::from(body))
        .map_err(|e| ProxyError::Construction(e.to_string()))?;

    let headers = request.headers_mut();
    for (name, value) in parts.headers.iter() {
        headers.insert(name.clone(), value.clone());
    }

    Ok(request)
}

fn absolute_target(parts: &Parts) -> Result<Uri, ProxyError> {
    if parts.uri.scheme().is_some() && parts.uri.authority().is_some() {
        return Ok(parts.uri.clone());
    }

    let host = parts
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ProxyError::Construction(format!("no origin for target {}", parts.uri)))?;
    let path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    format!("http://{host}{path}")
        .parse::<Uri>()
        .map_err(|e| ProxyError::Construction(e.to_string()))
}
