//! Replays pool events from a JSON-lines file.

use super::{EventSource, EventSourceError, SourceMessage};
use crate::domain::{ChainEvent, RawEnvelope};
use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tracing::warn;

/// Reads one JSON envelope per line.
///
/// Lines that fail to decode are logged and skipped.
pub struct JsonLinesEventSource<R> {
    lines: Lines<BufReader<R>>,
    line_no: usize,
}

impl JsonLinesEventSource<File> {
    pub async fn open(path: &str) -> Result<Self, EventSourceError> {
        let file = File::open(path)
            .await
            .map_err(|source| EventSourceError::Open {
                path: path.to_string(),
                source,
            })?;
        Ok(Self::new(file))
    }
}

impl<R: AsyncRead + Unpin> JsonLinesEventSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
            line_no: 0,
        }
    }

    fn decode(&self, line: &str) -> Option<SourceMessage> {
        let envelope: RawEnvelope = match serde_json::from_str(line) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(line = self.line_no, "Skipping malformed event line: {}", e);
                return None;
            }
        };
        if envelope.is_setup() {
            return Some(SourceMessage::Setup);
        }
        match ChainEvent::from_envelope(envelope) {
            Ok(event) => Some(SourceMessage::Event(event)),
            Err(e) => {
                warn!(line = self.line_no, "Skipping undecodable event: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> EventSource for JsonLinesEventSource<R> {
    async fn next_message(&mut self) -> Result<Option<SourceMessage>, EventSourceError> {
        while let Some(line) = self.lines.next_line().await? {
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            if let Some(message) = self.decode(&line) {
                return Ok(Some(message));
            }
        }
        Ok(None)
    }
}
