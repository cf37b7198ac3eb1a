//! Captured exchange value type
//!
//! One request/response pair observed by the intercepting proxy. The proxy
//! is an external collaborator; it forwards each completed exchange to the
//! ingest endpoint, which turns it into this type.

use serde_json::Value;

/// One captured request/response pair.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub method: String,
    pub path: String,
    pub host: String,
    /// Response body bytes, when the proxy captured any
    pub response_body: Option<Vec<u8>>,
}

impl Exchange {
    /// Path split into non-empty segments, query string stripped.
    pub fn path_segments(&self) -> Vec<&str> {
        self.path
            .split('?')
            .next()
            .unwrap_or("")
            .split('/')
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Response body parsed as JSON. A missing or malformed body yields
    /// `None`, never an error.
    pub fn json_body(&self) -> Option<Value> {
        self.response_body
            .as_deref()
            .and_then(|bytes| serde_json::from_slice(bytes).ok())
    }
}
