//! Auditing forward HTTP proxy library.

pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod persistence;
pub mod routing;

pub use config::ProxyConfig;
pub use error::ProxyError;
pub use http::ProxyServer;
pub use lifecycle::Shutdown;
pub use persistence::{AuditSink, JsonlSink, SqliteSink};
