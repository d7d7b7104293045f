//! Channel over an arbitrary async duplex stream.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::Channel;
use crate::config::DEFAULT_READ_CHUNK;
use crate::encoding::Utf8Decoder;
use crate::error::{ConverseError, Result};

/// A [`Channel`] backed by any `AsyncRead + AsyncWrite` stream.
#[derive(Debug)]
pub struct TransportChannel<T> {
    transport: Option<T>,
    decoder: Utf8Decoder,
    buf: Vec<u8>,
    started: bool,
    eof: bool,
}

impl<T> TransportChannel<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap a transport.
    pub fn new(transport: T) -> Self {
        Self::with_read_chunk(transport, DEFAULT_READ_CHUNK)
    }

    /// Wrap a transport, reading at most `read_chunk` bytes at a time.
    pub fn with_read_chunk(transport: T, read_chunk: usize) -> Self {
        Self {
            transport: Some(transport),
            decoder: Utf8Decoder::new(),
            buf: vec![0; read_chunk.max(1)],
            started: false,
            eof: false,
        }
    }

    /// The wrapped transport, until the channel is stopped.
    #[must_use]
    pub const fn transport(&self) -> Option<&T> {
        self.transport.as_ref()
    }

    /// Number of invalid bytes replaced while decoding.
    #[must_use]
    pub const fn replacements(&self) -> usize {
        self.decoder.replacements()
    }
}

impl<T> Channel for TransportChannel<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn start(&mut self) -> Result<()> {
        if self.transport.is_none() {
            return Err(ConverseError::ChannelClosed);
        }
        self.started = true;
        Ok(())
    }

    async fn read_chunk(&mut self) -> Result<Option<String>> {
        let Some(transport) = self.transport.as_mut() else {
            return Ok(None);
        };
        if self.eof {
            return Ok(None);
        }

        loop {
            let n = transport
                .read(&mut self.buf)
                .await
                .map_err(|e| ConverseError::io_context("reading from peer", e))?;

            if n == 0 {
                self.eof = true;
                let rest = self.decoder.finish();
                return Ok((!rest.is_empty()).then_some(rest));
            }

            let text = self.decoder.decode(&self.buf[..n]);
            if !text.is_empty() {
                return Ok(Some(text));
            }
        }
    }

    async fn write_line(&mut self, line: &str) -> Result<()> {
        let transport = self.transport.as_mut().ok_or(ConverseError::ChannelClosed)?;
        let mut data = String::with_capacity(line.len() + 1);
        data.push_str(line);
        data.push('\n');

        transport
            .write_all(data.as_bytes())
            .await
            .map_err(|e| ConverseError::io_context("writing to peer", e))?;
        transport
            .flush()
            .await
            .map_err(|e| ConverseError::io_context("flushing peer input", e))
    }

    async fn stop(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.shutdown().await {
                tracing::debug!(error = %e, "transport shutdown failed");
            }
        }
    }

    fn is_running(&self) -> bool {
        self.started && self.transport.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn reads_and_writes_over_duplex() {
        let (near, mut far) = duplex(64);
        let mut channel = TransportChannel::new(near);
        channel.start().await.unwrap();
        assert!(channel.is_running());

        far.write_all(b"Doctor: ").await.unwrap();
        assert_eq!(channel.read_chunk().await.unwrap().as_deref(), Some("Doctor: "));

        channel.write_line("Hello").await.unwrap();
        let mut buf = [0u8; 16];
        let n = far.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"Hello\n");

        drop(far);
        assert_eq!(channel.read_chunk().await.unwrap(), None);
        assert_eq!(channel.read_chunk().await.unwrap(), None);
    }

    #[tokio::test]
    async fn multibyte_split_across_reads() {
        let (near, mut far) = duplex(64);
        let mut channel = TransportChannel::with_read_chunk(near, 2);
        channel.start().await.unwrap();

        far.write_all("好".as_bytes()).await.unwrap();
        assert_eq!(channel.read_chunk().await.unwrap().as_deref(), Some("好"));
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let (near, _far) = duplex(64);
        let mut channel = TransportChannel::new(near);
        channel.start().await.unwrap();

        channel.stop().await;
        channel.stop().await;
        assert!(!channel.is_running());
        assert!(channel.transport().is_none());
        assert_eq!(channel.read_chunk().await.unwrap(), None);
        assert!(matches!(
            channel.write_line("late").await,
            Err(ConverseError::ChannelClosed)
        ));
        assert!(channel.start().await.is_err());
    }
}
