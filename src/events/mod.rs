//! Event sources feeding the indexing pipeline.
//!
//! A source yields a one-time `Setup` signal followed by decoded pool events.

use crate::domain::ChainEvent;
use async_trait::async_trait;
use thiserror::Error;

pub mod channel;
pub mod jsonl;

pub use channel::ChannelEventSource;
pub use jsonl::JsonLinesEventSource;

/// One message from an event source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceMessage {
    /// Startup signal; triggers the seed backfill.
    Setup,
    Event(ChainEvent),
}

#[derive(Debug, Error)]
pub enum EventSourceError {
    #[error("failed to open event file {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read event stream: {0}")]
    Io(#[from] std::io::Error),
}

/// Ordered stream of source messages. `Ok(None)` marks the end of the stream.
#[async_trait]
pub trait EventSource: Send {
    async fn next_message(&mut self) -> Result<Option<SourceMessage>, EventSourceError>;
}
