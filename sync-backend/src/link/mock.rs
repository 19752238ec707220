//! Mock link for testing.
//!
//! Allows queueing incoming bytes and capturing sent bytes for verification.

use super::{Link, LinkError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// Mock link for testing.
///
/// Clones share state, so a test can keep one handle while the server owns
/// another. `recv()` waits for queued bytes until the link is closed.
#[derive(Debug, Default, Clone)]
pub struct MockLink {
    inner: Arc<Mutex<MockLinkInner>>,
    incoming: Arc<Notify>,
}

#[derive(Debug, Default)]
struct MockLinkInner {
    connected: bool,
    sent: Vec<Vec<u8>>,
    receive_queue: VecDeque<Vec<u8>>,
    fail_next_send: Option<String>,
    fail_next_recv: Option<String>,
}

impl MockLink {
    /// Create a disconnected mock link.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a connected mock link.
    pub fn connected() -> Self {
        let link = Self::new();
        link.lock().connected = true;
        link
    }

    fn lock(&self) -> MutexGuard<'_, MockLinkInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue bytes to be returned by a `recv()` call.
    pub fn queue_incoming(&self, data: Vec<u8>) {
        self.lock().receive_queue.push_back(data);
        self.incoming.notify_waiters();
    }

    /// Get all bytes that were sent, one entry per `send()`.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.lock().sent.clone()
    }

    /// Get all sent bytes concatenated.
    pub fn sent_bytes(&self) -> Vec<u8> {
        self.lock().sent.concat()
    }

    /// Cause the next send() to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        self.lock().fail_next_send = Some(error.to_string());
    }

    /// Cause the next recv() to fail with the given error.
    pub fn fail_next_recv(&self, error: &str) {
        self.lock().fail_next_recv = Some(error.to_string());
        self.incoming.notify_waiters();
    }
}

#[async_trait]
impl Link for MockLink {
    async fn send(&self, data: &[u8]) -> Result<(), LinkError> {
        let mut inner = self.lock();

        if !inner.connected {
            return Err(LinkError::NotConnected);
        }

        // Check for forced failure
        if let Some(error) = inner.fail_next_send.take() {
            return Err(LinkError::SendFailed(error));
        }

        inner.sent.push(data.to_vec());
        Ok(())
    }

    async fn recv(&self) -> Result<Vec<u8>, LinkError> {
        loop {
            let notified = self.incoming.notified();
            {
                let mut inner = self.lock();

                if let Some(error) = inner.fail_next_recv.take() {
                    return Err(LinkError::ReceiveFailed(error));
                }
                if let Some(data) = inner.receive_queue.pop_front() {
                    return Ok(data);
                }
                if !inner.connected {
                    return Err(LinkError::ConnectionClosed);
                }
            }
            notified.await;
        }
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }

    async fn close(&self) -> Result<(), LinkError> {
        self.lock().connected = false;
        self.incoming.notify_waiters();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn mock_link_sends_bytes() {
        let link = MockLink::connected();

        link.send(b"chunk 1").await.unwrap();
        link.send(b"chunk 2").await.unwrap();

        let sent = link.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], b"chunk 1");
        assert_eq!(link.sent_bytes(), b"chunk 1chunk 2");
    }

    #[tokio::test]
    async fn mock_link_receives_queued_bytes() {
        let link = MockLink::connected();
        link.queue_incoming(b"first".to_vec());
        link.queue_incoming(b"second".to_vec());

        assert_eq!(link.recv().await.unwrap(), b"first");
        assert_eq!(link.recv().await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn recv_waits_for_incoming() {
        let link = MockLink::connected();
        let remote = link.clone();

        let reader = tokio::spawn(async move { link.recv().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        remote.queue_incoming(b"late".to_vec());

        assert_eq!(reader.await.unwrap().unwrap(), b"late");
    }

    #[tokio::test]
    async fn close_ends_pending_recv() {
        let link = MockLink::connected();
        let remote = link.clone();

        let reader = tokio::spawn(async move { link.recv().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        remote.close().await.unwrap();

        assert!(matches!(
            reader.await.unwrap(),
            Err(LinkError::ConnectionClosed)
        ));
        assert!(!remote.is_connected());
    }

    #[tokio::test]
    async fn queued_bytes_drain_after_close() {
        let link = MockLink::connected();
        link.queue_incoming(b"last words".to_vec());
        link.close().await.unwrap();

        assert_eq!(link.recv().await.unwrap(), b"last words");
        assert!(matches!(link.recv().await, Err(LinkError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn send_requires_connection() {
        let link = MockLink::new();
        assert!(matches!(
            link.send(b"data").await,
            Err(LinkError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn forced_failures() {
        let link = MockLink::connected();

        link.fail_next_send("cable unplugged");
        let err = link.send(b"data").await.unwrap_err();
        assert!(err.to_string().contains("cable unplugged"));
        link.send(b"data").await.unwrap();

        link.fail_next_recv("framing");
        assert!(matches!(
            link.recv().await,
            Err(LinkError::ReceiveFailed(_))
        ));
    }
}
