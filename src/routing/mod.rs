//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request
//!     → router.rs (method check)
//!     → CONNECT        → http::tunnel
//!     → everything else → axum Router fallback → http::intercept
//! ```
//!
//! # Design Decisions
//! - No per-client affinity, no retries
//! - Deterministic: the method alone decides the path

pub mod router;

pub use router::{AppState, Dispatcher};
