//! Request metadata carried from HTTP headers into commands.

use std::collections::HashMap;

use axum::http::HeaderMap;

/// Header propagated into every published event.
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Lowercased request headers that handlers may consult.
#[derive(Debug, Clone, Default)]
pub struct Session {
    variables: HashMap<String, String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every header with a UTF-8 value.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let variables = headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        Self { variables }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.variables.get(key).map(|v| v.as_str())
    }

    /// The caller-supplied correlation id, if any and non-blank.
    pub fn correlation_id(&self) -> Option<String> {
        self.get(CORRELATION_ID_HEADER)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    }
}
