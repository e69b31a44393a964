//! SQLite audit sink.
//!
//! Two tables, created on open if missing:
//! - `requests(method, path, get_params, headers, cookies, post_params)`
//! - `responses(code, message, headers, body)`
//!
//! Map-valued columns hold JSON objects. Each insert runs in autocommit mode,
//! so a returned `Ok` means the row is committed.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{params, Connection};

use crate::http::request::CapturedRequest;
use crate::http::response::CapturedResponse;
use crate::persistence::{AuditSink, SinkError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS requests (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    method      TEXT NOT NULL,
    path        TEXT NOT NULL,
    get_params  TEXT NOT NULL,
    headers     TEXT NOT NULL,
    cookies     TEXT NOT NULL,
    post_params TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS responses (
    id      INTEGER PRIMARY KEY AUTOINCREMENT,
    code    INTEGER NOT NULL,
    message TEXT NOT NULL,
    headers TEXT NOT NULL,
    body    TEXT NOT NULL
);
";

/// Audit sink backed by a single SQLite connection.
pub struct SqliteSink {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteSink {
    /// Open (or create) the database and make sure both tables exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        conn.execute_batch(SCHEMA)?;

        tracing::debug!(path = %path.display(), "SQLite audit schema ready");
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, SinkError>,
    ) -> Result<T, SinkError> {
        let conn = self.conn.lock().map_err(|_| {
            SinkError::Unavailable(format!("{} connection poisoned", self.path.display()))
        })?;
        f(&conn)
    }
}

impl AuditSink for SqliteSink {
    fn record_request(&self, request: &CapturedRequest) -> Result<(), SinkError> {
        let get_params = serde_json::to_string(&request.get_params)?;
        let headers = serde_json::to_string(&request.headers)?;
        let cookies = serde_json::to_string(&request.cookies)?;
        let post_params = serde_json::to_string(&request.post_params)?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO requests (method, path, get_params, headers, cookies, post_params)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![request.method, request.path, get_params, headers, cookies, post_params],
            )?;
            Ok(())
        })
    }

    fn record_response(&self, response: &CapturedResponse) -> Result<(), SinkError> {
        let headers = serde_json::to_string(&response.headers)?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO responses (code, message, headers, body) VALUES (?1, ?2, ?3, ?4)",
                params![response.code, response.message, headers, response.body],
            )?;
            Ok(())
        })
    }
}
