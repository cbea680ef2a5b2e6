//! Incremental `text/event-stream` parser.
//!
//! Consumes raw body chunks split at arbitrary boundaries and yields
//! complete [`SseFrame`]s.
//!
//! It handles:
//! - `\n`, `\r\n` and bare `\r` line endings, including a `\r\n` split
//!   across two chunks,
//! - multi-line `data:` fields joined with `\n`,
//! - `event:`, `id:` and `retry:` fields and `:` comment lines,
//! - a leading UTF-8 byte order mark,
//! - `last_event_id` persistence across events.
//!
//! An unterminated line or a pending event's data longer than the
//! configured limit fails the feed with [`Error::MalformedPayload`].

// ============================================================================
// Imports
// ============================================================================

use std::mem;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Event type used when no `event:` field is present.
pub const DEFAULT_EVENT_TYPE: &str = "message";

/// Default cap on an unterminated line and on one event's data (1 MiB).
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Bytes of an oversized line kept in the error.
const PREVIEW_LENGTH: usize = 64;

/// UTF-8 byte order mark.
const BOM: &[u8] = b"\xEF\xBB\xBF";

// ============================================================================
// SseFrame
// ============================================================================

/// One dispatched Server-Sent Event, data still as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Event type.
    pub event: String,
    /// Data lines joined with `\n`.
    pub data: String,
    /// Last event ID in effect when the event was dispatched.
    pub id: Option<String>,
}

// ============================================================================
// SseParser
// ============================================================================

/// Streaming parser state.
#[derive(Debug)]
pub struct SseParser {
    /// Bytes not yet terminated by a line ending.
    buffer: Vec<u8>,
    /// `data:` accumulated for the pending event.
    data: String,
    /// `event:` of the pending event.
    event: String,
    /// Whether the pending event has at least one `data:` line.
    has_data: bool,
    /// Most recent `id:` value.
    last_event_id: Option<String>,
    /// Most recent valid `retry:` value in milliseconds.
    retry_ms: Option<u64>,
    /// Whether the stream start (BOM check) is behind us.
    started: bool,
    /// Whether the previous chunk ended on `\r`.
    pending_cr: bool,
    /// Limit for `buffer` and `data`, in bytes.
    max_length: usize,
}

impl Default for SseParser {
    fn default() -> Self {
        Self::with_max_line_length(DEFAULT_MAX_LINE_LENGTH)
    }
}

impl SseParser {
    /// Creates an empty parser with [`DEFAULT_MAX_LINE_LENGTH`].
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty parser that rejects lines and event data longer
    /// than `max_length` bytes.
    #[must_use]
    pub fn with_max_line_length(max_length: usize) -> Self {
        Self {
            buffer: Vec::new(),
            data: String::new(),
            event: String::new(),
            has_data: false,
            last_event_id: None,
            retry_ms: None,
            started: false,
            pending_cr: false,
            max_length,
        }
    }

    /// Returns the most recent event ID received.
    #[inline]
    #[must_use]
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Returns the reconnection time requested by the server, if any.
    #[inline]
    #[must_use]
    pub fn retry_ms(&self) -> Option<u64> {
        self.retry_ms
    }

    /// Feeds a chunk and returns every event it completes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedPayload`] when the unterminated line or the
    /// pending event's data exceeds the length limit. The pending state is
    /// discarded; events completed earlier in the same chunk are lost.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<SseFrame>> {
        if chunk.is_empty() {
            return Ok(Vec::new());
        }

        let mut chunk = chunk;

        // A `\n` right after a chunk-final `\r` belongs to that line ending.
        if mem::take(&mut self.pending_cr) && chunk.first() == Some(&b'\n') {
            chunk = &chunk[1..];
        }

        self.buffer.extend_from_slice(chunk);

        if !self.started {
            if self.buffer.len() < BOM.len() && BOM.starts_with(&self.buffer) {
                return Ok(Vec::new());
            }
            if self.buffer.starts_with(BOM) {
                self.buffer.drain(..BOM.len());
            }
            self.started = true;
        }

        let mut frames = Vec::new();
        let mut start = 0;
        let mut position = 0;

        while position < self.buffer.len() {
            match self.buffer[position] {
                b'\n' => {
                    let line = String::from_utf8_lossy(&self.buffer[start..position]).into_owned();
                    self.process_line(&line, &mut frames);
                    position += 1;
                    start = position;
                }
                b'\r' => {
                    let line = String::from_utf8_lossy(&self.buffer[start..position]).into_owned();
                    self.process_line(&line, &mut frames);
                    position += 1;
                    match self.buffer.get(position) {
                        Some(b'\n') => position += 1,
                        Some(_) => {}
                        None => self.pending_cr = true,
                    }
                    start = position;
                }
                _ => position += 1,
            }
        }

        self.buffer.drain(..start);

        if self.buffer.len() > self.max_length || self.data.len() > self.max_length {
            return Err(self.overflow());
        }

        Ok(frames)
    }

    /// Discards pending state and describes the oversized input.
    fn overflow(&mut self) -> Error {
        let pending = if self.buffer.len() > self.max_length {
            String::from_utf8_lossy(&self.buffer[..PREVIEW_LENGTH.min(self.buffer.len())])
                .into_owned()
        } else {
            self.data.chars().take(PREVIEW_LENGTH).collect()
        };

        self.buffer.clear();
        self.data.clear();
        self.event.clear();
        self.has_data = false;

        Error::malformed_payload(
            format!("SSE line exceeds {} bytes", self.max_length),
            pending,
        )
    }

    /// Processes one complete line.
    fn process_line(&mut self, line: &str, frames: &mut Vec<SseFrame>) {
        if line.is_empty() {
            self.dispatch(frames);
            return;
        }

        // Comment
        if line.starts_with(':') {
            return;
        }

        let (name, value) = match line.split_once(':') {
            Some((name, value)) => (name, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match name {
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "event" => self.event = value.to_string(),
            "id" if !value.contains('\0') => self.last_event_id = Some(value.to_string()),
            "retry" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.retry_ms = Some(ms);
                }
            }
            _ => {}
        }
    }

    /// Completes the pending event on a blank line.
    fn dispatch(&mut self, frames: &mut Vec<SseFrame>) {
        let event = mem::take(&mut self.event);

        if !mem::take(&mut self.has_data) {
            return;
        }

        frames.push(SseFrame {
            event: if event.is_empty() {
                DEFAULT_EVENT_TYPE.to_string()
            } else {
                event
            },
            data: mem::take(&mut self.data),
            id: self.last_event_id.clone(),
        });
    }
}

// ============================================================================
// Tests
// ============================================================================
