//! Request dispatch.
//!
//! # Responsibilities
//! - Send CONNECT to the tunnel establisher
//! - Send every other method through the axum router to the interceptor
//!
//! # Design Decisions
//! - CONNECT is split off before axum sees it: its authority-form target
//!   has no path to route on
//! - Immutable after construction (cheap to clone per connection)

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    response::{IntoResponse, Response},
    Router,
};
use tower::ServiceExt;
use tower_http::trace::TraceLayer;

use crate::http::intercept::Interceptor;
use crate::http::tunnel;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub interceptor: Arc<Interceptor>,
}

/// Stateless CONNECT / plain-HTTP dispatcher.
#[derive(Clone)]
pub struct Dispatcher {
    http: Router,
}

impl Dispatcher {
    pub fn new(interceptor: Arc<Interceptor>) -> Self {
        let http = Router::new()
            .fallback(intercept_handler)
            .with_state(AppState { interceptor })
            .layer(TraceLayer::new_for_http());
        Self { http }
    }

    pub async fn dispatch(&self, request: Request<Body>) -> Response {
        if request.method() == Method::CONNECT {
            return match tunnel::establish(request).await {
                Ok(response) => response,
                Err(e) => e.into_response(),
            };
        }

        match self.http.clone().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }
}

async fn intercept_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    match state.interceptor.intercept(request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

/// Adapter so the dispatcher can sit behind `hyper::service::service_fn`.
pub async fn serve_request(
    dispatcher: Dispatcher,
    request: Request<Body>,
) -> Result<Response, Infallible> {
    Ok(dispatcher.dispatch(request).await)
}
