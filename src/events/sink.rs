//! Subscriber sinks.

use super::JobEvent;
use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Subscriber disconnected")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Destination of published events.
///
/// A sink that returns an error is dropped by the broadcaster and never
/// called again.
#[async_trait]
pub trait EventSink: Send + 'static {
    async fn send(&mut self, event: &JobEvent) -> Result<(), SinkError>;

    /// Called once when the subscriber is removed.
    async fn close(&mut self) {}
}

/// Forwards events into an mpsc channel.
pub struct ChannelSink {
    tx: mpsc::Sender<JobEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<JobEvent>) -> Self {
        Self { tx }
    }

    /// Create a sink with its receiving end.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<JobEvent>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn send(&mut self, event: &JobEvent) -> Result<(), SinkError> {
        self.tx
            .send(event.clone())
            .await
            .map_err(|_| SinkError::Closed)
    }
}

/// Writes one JSON object per line.
pub struct JsonLinesSink<W> {
    writer: W,
}

impl<W> JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl<W> EventSink for JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn send(&mut self, event: &JobEvent) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        self.writer.write_all(&line).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn close(&mut self) {
        let _ = self.writer.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::JobId;
    use crate::state::JobStatus;

    fn event() -> JobEvent {
        JobEvent::new(JobId::new(), JobStatus::Processing, 0.25, Some("working".into()), None)
    }

    #[tokio::test]
    async fn test_channel_sink_forwards() {
        let (mut sink, mut rx) = ChannelSink::channel(4);
        let event = event();
        sink.send(&event).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().id, event.id);
    }

    #[tokio::test]
    async fn test_channel_sink_closed() {
        let (mut sink, rx) = ChannelSink::channel(4);
        drop(rx);
        assert!(matches!(sink.send(&event()).await, Err(SinkError::Closed)));
    }

    #[tokio::test]
    async fn test_json_lines_sink() {
        let (client, mut server) = tokio::io::duplex(4096);
        let mut sink = JsonLinesSink::new(client);
        let first = event();
        let second = event();
        sink.send(&first).await.unwrap();
        sink.send(&second).await.unwrap();
        sink.close().await;

        let mut buf = String::new();
        tokio::io::AsyncReadExt::read_to_string(&mut server, &mut buf)
            .await
            .unwrap();
        let lines: Vec<JobEvent> = buf
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].id, first.id);
        assert_eq!(lines[1].id, second.id);
    }
}
