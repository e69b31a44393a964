//! In-process audit sink for unit tests.

use std::sync::Mutex;

use crate::http::request::CapturedRequest;
use crate::http::response::CapturedResponse;
use crate::persistence::{AuditSink, SinkError};

/// Keeps every record in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemorySink {
    requests: Mutex<Vec<CapturedRequest>>,
    responses: Mutex<Vec<CapturedResponse>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the stored request records.
    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Snapshot of the stored response records.
    pub fn responses(&self) -> Vec<CapturedResponse> {
        self.responses
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

impl AuditSink for MemorySink {
    fn record_request(&self, request: &CapturedRequest) -> Result<(), SinkError> {
        self.requests
            .lock()
            .map_err(|_| SinkError::Unavailable("memory sink poisoned".into()))?
            .push(request.clone());
        Ok(())
    }

    fn record_response(&self, response: &CapturedResponse) -> Result<(), SinkError> {
        self.responses
            .lock()
            .map_err(|_| SinkError::Unavailable("memory sink poisoned".into()))?
            .push(response.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_records_in_order() {
        let sink = MemorySink::new();
        for path in ["/a", "/b"] {
            let record = CapturedRequest {
                method: "GET".into(),
                path: path.into(),
                ..Default::default()
            };
            sink.record_request(&record).unwrap();
        }

        let paths: Vec<_> = sink.requests().into_iter().map(|r| r.path).collect();
        assert_eq!(paths, vec!["/a", "/b"]);
        assert!(sink.responses().is_empty());
    }
}
