//! Link over any tokio byte stream (serial port, TCP socket, pipe).

use super::{Link, LinkError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;

const READ_BUFFER_LEN: usize = 4096;

/// Byte-stream link. Each `recv()` returns whatever one read produced.
#[derive(Debug)]
pub struct StreamLink<S> {
    reader: Mutex<ReadHalf<S>>,
    writer: Mutex<WriteHalf<S>>,
    connected: AtomicBool,
}

impl<S: AsyncRead + AsyncWrite> StreamLink<S> {
    /// Wrap an open stream.
    pub fn new(stream: S) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            connected: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl<S: AsyncRead + AsyncWrite + Send + 'static> Link for StreamLink<S> {
    async fn send(&self, data: &[u8]) -> Result<(), LinkError> {
        if !self.is_connected() {
            return Err(LinkError::NotConnected);
        }
        let mut writer = self.writer.lock().await;
        writer
            .write_all(data)
            .await
            .map_err(|e| LinkError::SendFailed(e.to_string()))?;
        writer
            .flush()
            .await
            .map_err(|e| LinkError::SendFailed(e.to_string()))
    }

    async fn recv(&self) -> Result<Vec<u8>, LinkError> {
        let mut buffer = vec![0u8; READ_BUFFER_LEN];
        let read = self
            .reader
            .lock()
            .await
            .read(&mut buffer)
            .await
            .map_err(|e| LinkError::ReceiveFailed(e.to_string()))?;
        if read == 0 {
            self.connected.store(false, Ordering::SeqCst);
            return Err(LinkError::ConnectionClosed);
        }
        buffer.truncate(read);
        Ok(buffer)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), LinkError> {
        self.connected.store(false, Ordering::SeqCst);
        self.writer
            .lock()
            .await
            .shutdown()
            .await
            .map_err(|e| LinkError::SendFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bytes_cross_the_stream() {
        let (local, mut remote) = tokio::io::duplex(64);
        let link = StreamLink::new(local);

        link.send(b"\x03abc\x00").await.unwrap();
        let mut received = [0u8; 5];
        remote.read_exact(&mut received).await.unwrap();
        assert_eq!(&received, b"\x03abc\x00");

        remote.write_all(b"reply").await.unwrap();
        assert_eq!(link.recv().await.unwrap(), b"reply");
    }

    #[tokio::test]
    async fn peer_hangup_closes_link() {
        let (local, remote) = tokio::io::duplex(64);
        let link = StreamLink::new(local);
        drop(remote);

        assert!(matches!(link.recv().await, Err(LinkError::ConnectionClosed)));
        assert!(!link.is_connected());
        assert!(matches!(link.send(b"x").await, Err(LinkError::NotConnected)));
    }
}
