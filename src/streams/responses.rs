//! Response broadcast and the bounded response log.
//!
//! [`ResponseStream`] is a live-only multicast: each published
//! [`ApiResponse`] goes to every current subscriber, and a late subscriber
//! sees nothing published before it subscribed.
//!
//! [`ResponseLog`] is the consumption pattern a presentation layer applies
//! on top: keep the newest responses first, bounded to 20 by default.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::fmt;

use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{trace, warn};

use crate::protocol::ApiResponse;

// ============================================================================
// Constants
// ============================================================================

/// Default broadcast buffer per subscriber.
pub const DEFAULT_RESPONSE_BUFFER: usize = 256;

/// Default number of responses a [`ResponseLog`] keeps.
pub const DEFAULT_RESPONSE_LOG_CAPACITY: usize = 20;

// ============================================================================
// ResponseStream
// ============================================================================

/// Fan-out channel of normalized responses.
///
/// Cloning yields another publisher for the same channel.
#[derive(Clone)]
pub struct ResponseStream {
    /// Broadcast sender shared by all publishers.
    sender: broadcast::Sender<ApiResponse>,
}

impl Default for ResponseStream {
    fn default() -> Self {
        Self::new(DEFAULT_RESPONSE_BUFFER)
    }
}

impl fmt::Debug for ResponseStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseStream")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl ResponseStream {
    /// Creates a channel buffering up to `buffer` responses per subscriber.
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer.max(1));
        Self { sender }
    }

    /// Publishes a response to all current subscribers.
    ///
    /// Returns the number of subscribers reached. Publishing with no
    /// subscribers drops the response.
    pub fn publish(&self, response: ApiResponse) -> usize {
        trace!(
            response_id = %response.id,
            request_id = %response.request_id,
            protocol = %response.protocol,
            "Publishing response"
        );
        self.sender.send(response).unwrap_or(0)
    }

    /// Returns the number of live subscribers.
    #[inline]
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Returns a raw receiver for responses published from now on.
    #[inline]
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ApiResponse> {
        self.sender.subscribe()
    }

    /// Returns a stream of responses published from now on.
    ///
    /// A subscriber that falls more than the buffer behind skips the
    /// oldest responses; the gap is logged.
    #[must_use]
    pub fn stream(&self) -> BoxStream<'static, ApiResponse> {
        BroadcastStream::new(self.subscribe())
            .filter_map(|item| async move {
                match item {
                    Ok(response) => Some(response),
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(skipped, "Response subscriber lagged");
                        None
                    }
                }
            })
            .boxed()
    }
}

// ============================================================================
// ResponseLog
// ============================================================================

/// Newest-first, size-bounded list of responses kept by a consumer.
#[derive(Debug, Clone)]
pub struct ResponseLog {
    /// Entries, newest first.
    entries: VecDeque<ApiResponse>,
    /// Maximum number of entries.
    capacity: usize,
}

impl Default for ResponseLog {
    fn default() -> Self {
        Self::new(DEFAULT_RESPONSE_LOG_CAPACITY)
    }
}

impl ResponseLog {
    /// Creates an empty log. A zero capacity is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Prepends a response, dropping the oldest beyond capacity.
    pub fn push(&mut self, response: ApiResponse) {
        self.entries.push_front(response);
        self.entries.truncate(self.capacity);
    }

    /// Returns the newest response.
    #[inline]
    #[must_use]
    pub fn latest(&self) -> Option<&ApiResponse> {
        self.entries.front()
    }

    /// Iterates newest first.
    pub fn iter(&self) -> impl Iterator<Item = &ApiResponse> {
        self.entries.iter()
    }

    /// Returns the number of entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Extend<ApiResponse> for ResponseLog {
    fn extend<I: IntoIterator<Item = ApiResponse>>(&mut self, iter: I) {
        for response in iter {
            self.push(response);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::protocol::ApiType;

    fn live(n: u64) -> ApiResponse {
        ApiResponse::live(ApiType::Sse, json!(n))
    }

    #[test]
    fn test_publish_without_subscribers() {
        let stream = ResponseStream::default();
        assert_eq!(stream.publish(live(1)), 0);
    }

    #[tokio::test]
    async fn test_fan_out_to_all_subscribers() {
        let stream = ResponseStream::default();
        let mut a = stream.stream();
        let mut b = stream.stream();

        assert_eq!(stream.publish(live(1)), 2);

        assert_eq!(a.next().await.map(|r| r.data), Some(json!(1)));
        assert_eq!(b.next().await.map(|r| r.data), Some(json!(1)));
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_no_history() {
        let stream = ResponseStream::default();
        let _early = stream.subscribe();
        stream.publish(live(1));

        let mut late = stream.stream();
        stream.publish(live(2));
        assert_eq!(late.next().await.map(|r| r.data), Some(json!(2)));
    }

    #[tokio::test]
    async fn test_lagged_subscriber_skips_oldest() {
        let stream = ResponseStream::new(2);
        let mut slow = stream.stream();

        for n in 0..5 {
            stream.publish(live(n));
        }

        assert_eq!(slow.next().await.map(|r| r.data), Some(json!(3)));
        assert_eq!(slow.next().await.map(|r| r.data), Some(json!(4)));
    }

    #[test]
    fn test_response_log_bounded_newest_first() {
        let mut log = ResponseLog::default();
        log.extend((0..25).map(live));

        assert_eq!(log.len(), DEFAULT_RESPONSE_LOG_CAPACITY);
        assert_eq!(log.latest().map(|r| r.data.clone()), Some(json!(24)));
        assert_eq!(log.iter().last().map(|r| r.data.clone()), Some(json!(5)));

        log.clear();
        assert!(log.is_empty());
    }
}
