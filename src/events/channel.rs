//! In-process event source backed by a tokio mpsc channel.

use super::{EventSource, EventSourceError, SourceMessage};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Receives messages pushed by an in-process producer.
///
/// The stream ends once every sender has been dropped.
#[derive(Debug)]
pub struct ChannelEventSource {
    rx: mpsc::Receiver<SourceMessage>,
}

impl ChannelEventSource {
    /// Create a source and the sender that feeds it.
    pub fn channel(buffer: usize) -> (mpsc::Sender<SourceMessage>, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (tx, Self { rx })
    }
}

#[async_trait]
impl EventSource for ChannelEventSource {
    async fn next_message(&mut self) -> Result<Option<SourceMessage>, EventSourceError> {
        Ok(self.rx.recv().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_source_ends_when_senders_drop() {
        let (tx, mut source) = ChannelEventSource::channel(4);
        tx.send(SourceMessage::Setup).await.unwrap();
        drop(tx);

        assert_eq!(source.next_message().await.unwrap(), Some(SourceMessage::Setup));
        assert_eq!(source.next_message().await.unwrap(), None);
    }

    #[test]
    fn test_zero_buffer_still_accepts_a_message() {
        let (tx, mut source) = ChannelEventSource::channel(0);
        tokio_test::block_on(async {
            tx.send(SourceMessage::Setup).await.unwrap();
            assert_eq!(source.next_message().await.unwrap(), Some(SourceMessage::Setup));
        });
    }
}
