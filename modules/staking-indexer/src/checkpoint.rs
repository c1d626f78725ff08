use staking_store::EntityStore;
use staking_world::LogPosition;
use tracing::info;

use crate::error::IndexerError;

/// Last durably committed position for one named indexer.
///
/// Only moves after the store confirms a commit, never ahead of it.
#[derive(Debug, Clone)]
pub struct CheckpointTracker {
    name: String,
    committed: Option<LogPosition>,
}

impl CheckpointTracker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            committed: None,
        }
    }

    /// Resume from whatever the store last committed under `name`.
    pub async fn load<S: EntityStore + ?Sized>(
        store: &S,
        name: impl Into<String>,
    ) -> Result<Self, IndexerError> {
        let name = name.into();
        let committed = store
            .checkpoint(&name)
            .await
            .map_err(IndexerError::Store)?
            .map(|cp| cp.position);

        match committed {
            Some(position) => {
                info!(checkpoint = name.as_str(), %position, "Resuming from checkpoint")
            }
            None => info!(checkpoint = name.as_str(), "No checkpoint, starting from genesis"),
        }

        Ok(Self { name, committed })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Option<LogPosition> {
        self.committed
    }

    /// True if `position` is already covered by the committed checkpoint.
    pub fn covers(&self, position: LogPosition) -> bool {
        self.committed.is_some_and(|c| position <= c)
    }

    /// Record a successful commit up to `position`.
    pub(crate) fn advance(&mut self, position: LogPosition) {
        if !self.covers(position) {
            self.committed = Some(position);
        }
    }
}
