//! Audit persistence subsystem.
//!
//! # Data Flow
//! ```text
//! Interceptor
//!     → CapturedRequest  → AuditSink::record_request   ("requests" table)
//!     → CapturedResponse → AuditSink::record_response  ("responses" table)
//! ```
//!
//! # Design Decisions
//! - Sinks are synchronous; the interceptor runs them on the blocking pool
//!   and waits for the result before moving on
//! - A failed write is always reported back to the caller
//! - Records are independent: nothing links a request to its response

pub mod jsonl;
#[cfg(test)]
pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use thiserror::Error;

use crate::config::{PersistenceConfig, SinkBackend};
use crate::http::request::CapturedRequest;
use crate::http::response::CapturedResponse;

pub use jsonl::JsonlSink;
#[cfg(test)]
pub use memory::MemorySink;
pub use sqlite::SqliteSink;

/// Errors raised by an audit sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("audit write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("audit record could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("audit database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}

/// Durable storage for captured exchanges.
///
/// Implementations are shared by every connection, so they must tolerate
/// concurrent callers. Both methods block until the record is stored.
pub trait AuditSink: Send + Sync {
    fn record_request(&self, request: &CapturedRequest) -> Result<(), SinkError>;

    fn record_response(&self, response: &CapturedResponse) -> Result<(), SinkError>;
}

/// Open the sink selected by the persistence configuration.
pub fn open_sink(config: &PersistenceConfig) -> Result<Arc<dyn AuditSink>, SinkError> {
    let sink: Arc<dyn AuditSink> = match config.backend {
        SinkBackend::Jsonl => Arc::new(JsonlSink::open(&config.path)?),
        SinkBackend::Sqlite => Arc::new(SqliteSink::open(&config.path)?),
    };
    tracing::info!(backend = ?config.backend, path = %config.path, "Audit sink opened");
    Ok(sink)
}
