//! Normalized response record.
//!
//! Every outcome the adapters observe (HTTP success, HTTP failure,
//! WebSocket/SSE push, push-side error) is converted into one
//! [`ApiResponse`] shape so consumers inspect values instead of handling
//! errors per protocol.
//!
//! # Normalization Rules
//!
//! | Origin | `status` | `statusText` | `data` | `isLive` |
//! |--------|----------|--------------|--------|----------|
//! | HTTP completed | transport status | reason phrase | decoded body | `false` |
//! | HTTP failed | `0` unless known | `"Error"` unless known | error detail | `false` |
//! | WS/SSE message | none | none | parsed JSON | `true` |
//! | WS/SSE error | `0` | `"Error"` | error detail | `true` |

// ============================================================================
// Imports
// ============================================================================

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifiers::{RequestId, ResponseId};

use super::ApiType;

// ============================================================================
// Constants
// ============================================================================

/// Status used when a failure carries no transport status.
pub const FAILURE_STATUS: u16 = 0;

/// Status text used when a failure carries none.
pub const FAILURE_STATUS_TEXT: &str = "Error";

// ============================================================================
// ApiResponse
// ============================================================================

/// A normalized response, immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    /// Unique identifier, generated by the client.
    pub id: ResponseId,

    /// Originating request, or [`RequestId::live`] for push events.
    pub request_id: RequestId,

    /// Protocol the response arrived on.
    pub protocol: ApiType,

    /// Numeric status code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    /// Status text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,

    /// Payload, no schema assumed.
    pub data: Value,

    /// Response headers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,

    /// Milliseconds between dispatch and completion (0 for push events).
    pub response_time_ms: u64,

    /// Time the response was observed.
    pub received_at: SystemTime,

    /// `true` for WebSocket/SSE push events.
    #[serde(default)]
    pub is_live: bool,
}

// ============================================================================
// ApiResponse - Normalization
// ============================================================================

impl ApiResponse {
    /// Normalizes a completed HTTP exchange.
    #[must_use]
    pub fn from_http(
        request_id: RequestId,
        status: u16,
        status_text: impl Into<String>,
        data: Value,
        headers: HashMap<String, String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            id: ResponseId::generate(),
            request_id,
            protocol: ApiType::Http,
            status: Some(status),
            status_text: Some(status_text.into()),
            data,
            headers: Some(headers),
            response_time_ms: duration_ms(elapsed),
            received_at: SystemTime::now(),
            is_live: false,
        }
    }

    /// Normalizes a failed HTTP exchange.
    ///
    /// Missing status becomes `0`, missing status text becomes `"Error"`.
    #[must_use]
    pub fn from_http_failure(
        request_id: RequestId,
        status: Option<u16>,
        status_text: Option<String>,
        detail: Value,
        elapsed: Duration,
    ) -> Self {
        Self {
            id: ResponseId::generate(),
            request_id,
            protocol: ApiType::Http,
            status: Some(status.unwrap_or(FAILURE_STATUS)),
            status_text: Some(status_text.unwrap_or_else(|| FAILURE_STATUS_TEXT.to_string())),
            data: detail,
            headers: None,
            response_time_ms: duration_ms(elapsed),
            received_at: SystemTime::now(),
            is_live: false,
        }
    }

    /// Normalizes a pushed message.
    #[must_use]
    pub fn live(protocol: ApiType, data: Value) -> Self {
        Self {
            id: ResponseId::generate(),
            request_id: RequestId::live(),
            protocol,
            status: None,
            status_text: None,
            data,
            headers: None,
            response_time_ms: 0,
            received_at: SystemTime::now(),
            is_live: true,
        }
    }

    /// Normalizes a push-side failure.
    #[must_use]
    pub fn live_error(protocol: ApiType, detail: impl Into<String>) -> Self {
        Self {
            status: Some(FAILURE_STATUS),
            status_text: Some(FAILURE_STATUS_TEXT.to_string()),
            ..Self::live(protocol, Value::String(detail.into()))
        }
    }
}

// ============================================================================
// ApiResponse - Accessors
// ============================================================================

impl ApiResponse {
    /// Returns `true` for a 2xx status.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_some_and(|s| (200..300).contains(&s))
    }

    /// Returns `true` if the request never reached a status (`0`).
    #[inline]
    #[must_use]
    pub fn is_transport_failure(&self) -> bool {
        self.status == Some(FAILURE_STATUS)
    }

    /// Looks up a response header, case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .as_ref()?
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Converts a duration to whole milliseconds, saturating.
#[inline]
fn duration_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Tests
// ============================================================================
