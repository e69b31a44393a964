//! Append-only JSON lines audit sink.
//!
//! Each record becomes one line:
//! `{"table":"requests","id":"<uuid>","record":{...}}`.
//! The line is flushed before the call returns.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use uuid::Uuid;

use crate::http::request::CapturedRequest;
use crate::http::response::CapturedResponse;
use crate::persistence::{AuditSink, SinkError};

#[derive(Serialize)]
struct Envelope<'a, T> {
    table: &'static str,
    id: Uuid,
    record: &'a T,
}

/// Audit sink writing to a local file.
pub struct JsonlSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonlSink {
    /// Open (or create) the file in append mode.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    fn append<T: Serialize>(&self, table: &'static str, record: &T) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(&Envelope {
            table,
            id: Uuid::new_v4(),
            record,
        })?;
        line.push(b'\n');

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| {
                SinkError::Unavailable(format!("{} writer poisoned", self.path.display()))
            })?;
        writer.write_all(&line)?;
        writer.flush()?;
        Ok(())
    }
}

impl AuditSink for JsonlSink {
    fn record_request(&self, request: &CapturedRequest) -> Result<(), SinkError> {
        self.append("requests", request)
    }

    fn record_response(&self, response: &CapturedResponse) -> Result<(), SinkError> {
        self.append("responses", response)
    }
}
