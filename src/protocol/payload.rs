//! Payload decoding helpers.
//!
//! Inbound WebSocket frames and SSE `data` are JSON text. HTTP response
//! bodies carry no schema: they are decoded as JSON when possible and kept
//! as text otherwise.

// ============================================================================
// Imports
// ============================================================================

use std::error::Error as StdError;

use serde_json::Value;

use crate::error::{Error, Result};

// ============================================================================
// Decoding
// ============================================================================

/// Parses JSON text from a push channel.
///
/// # Errors
///
/// Returns [`Error::MalformedPayload`] carrying the raw text when the
/// payload is not valid JSON.
pub fn parse_json_text(text: &str) -> Result<Value> {
    serde_json::from_str(text).map_err(|e| Error::malformed_payload(e.to_string(), text))
}

/// Decodes an HTTP response body.
///
/// Empty bodies become `null`, JSON bodies are parsed, anything else is
/// returned as a (lossily decoded) string.
#[must_use]
pub fn decode_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }

    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// Renders an error with its source chain, `outer: inner: root`.
#[must_use]
pub fn error_detail(err: &dyn StdError) -> String {
    let mut detail = err.to_string();
    let mut source = err.source();

    while let Some(cause) = source {
        let text = cause.to_string();
        if !detail.contains(&text) {
            detail.push_str(": ");
            detail.push_str(&text);
        }
        source = cause.source();
    }

    detail
}

// ============================================================================
// Tests
// ============================================================================
