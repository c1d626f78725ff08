//! Inbound event sources.
//!
//! The chain reader itself lives upstream; the indexer only needs something it
//! can ask for "the next logs after position P". After a restart it asks again
//! from the committed checkpoint.

use std::path::Path;

use async_trait::async_trait;
use staking_world::{ChainLog, LogPosition, StakingEvent};

use crate::error::IndexerError;

#[async_trait]
pub trait EventSource: Send {
    /// Up to `limit` logs positioned strictly after `after`, ascending.
    ///
    /// At-least-once sources may hand back logs at or before `after`; the
    /// indexer skips those.
    async fn read_from(
        &mut self,
        after: Option<LogPosition>,
        limit: usize,
    ) -> Result<Vec<ChainLog>, IndexerError>;
}

// ---------------------------------------------------------------------------
// MemoryEventSource
// ---------------------------------------------------------------------------

/// Serves a fixed list of logs.
///
/// By default it honours `after`. A `redelivering` source ignores it and walks
/// its list with an internal cursor, the way a chain reader replays a range
/// after reconnecting.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventSource {
    logs: Vec<ChainLog>,
    cursor: Option<usize>,
}

impl MemoryEventSource {
    pub fn new(logs: Vec<ChainLog>) -> Self {
        Self { logs, cursor: None }
    }

    pub fn redelivering(logs: Vec<ChainLog>) -> Self {
        Self {
            logs,
            cursor: Some(0),
        }
    }
}

#[async_trait]
impl EventSource for MemoryEventSource {
    async fn read_from(
        &mut self,
        after: Option<LogPosition>,
        limit: usize,
    ) -> Result<Vec<ChainLog>, IndexerError> {
        match self.cursor.as_mut() {
            Some(cursor) => {
                let end = (*cursor + limit).min(self.logs.len());
                let batch = self.logs[*cursor..end].to_vec();
                *cursor = end;
                Ok(batch)
            }
            None => Ok(self
                .logs
                .iter()
                .filter(|log| after.map_or(true, |a| log.position > a))
                .take(limit)
                .cloned()
                .collect()),
        }
    }
}

// ---------------------------------------------------------------------------
// JsonLinesSource
// ---------------------------------------------------------------------------

/// Newline-delimited JSON `ChainLog` records, e.g. an export from the chain
/// reader used to replay history.
///
/// The whole file is decoded on open so an unknown event kind fails the run
/// before anything is committed.
#[derive(Debug, Clone)]
pub struct JsonLinesSource {
    inner: MemoryEventSource,
}

impl JsonLinesSource {
    pub async fn open(path: &Path) -> Result<Self, IndexerError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| IndexerError::Source(format!("reading {}: {e}", path.display())))?;
        Self::parse(&text, &path.display().to_string())
    }

    pub fn parse(text: &str, origin: &str) -> Result<Self, IndexerError> {
        let mut logs = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            logs.push(decode_line(line, &format!("{origin}:{}", idx + 1))?);
        }
        Ok(Self {
            inner: MemoryEventSource::new(logs),
        })
    }

    pub fn len(&self) -> usize {
        self.inner.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.logs.is_empty()
    }
}

#[async_trait]
impl EventSource for JsonLinesSource {
    async fn read_from(
        &mut self,
        after: Option<LogPosition>,
        limit: usize,
    ) -> Result<Vec<ChainLog>, IndexerError> {
        self.inner.read_from(after, limit).await
    }
}

/// Decode one record, telling an unrecognised event kind apart from a
/// malformed one.
pub fn decode_line(line: &str, location: &str) -> Result<ChainLog, IndexerError> {
    let value: serde_json::Value =
        serde_json::from_str(line).map_err(|e| IndexerError::Malformed {
            location: location.to_string(),
            reason: e.to_string(),
        })?;

    let kind = value
        .get("event")
        .and_then(|e| e.get("type"))
        .and_then(|t| t.as_str())
        .ok_or_else(|| IndexerError::Malformed {
            location: location.to_string(),
            reason: "missing event.type".to_string(),
        })?;

    if !StakingEvent::is_known_type(kind) {
        return Err(IndexerError::UnknownEventKind {
            kind: kind.to_string(),
            location: location.to_string(),
        });
    }

    serde_json::from_value(value).map_err(|e| IndexerError::Malformed {
        location: location.to_string(),
        reason: e.to_string(),
    })
}
