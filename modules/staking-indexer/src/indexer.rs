//! The ingestion loop.
//!
//! read batch → skip stale → prefetch → project → commit (writes + checkpoint)
//!
//! A batch is all-or-nothing. If anything fails before the commit returns, the
//! unit of work is dropped, the checkpoint stays where it was, and the next
//! call re-reads the same range.

use std::ops::AddAssign;

use serde::Serialize;
use staking_store::{EntityStore, UnitOfWork};
use staking_world::LogPosition;
use tracing::{debug, info, warn};

use crate::checkpoint::CheckpointTracker;
use crate::error::IndexerError;
use crate::projector::{ApplyResult, StakingProjector};
use crate::source::EventSource;

/// Counts for one batch or a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexerStats {
    pub batches: u64,
    pub applied: u64,
    pub duplicates: u64,
    /// Logs at or before the committed checkpoint, skipped unseen.
    pub stale: u64,
    /// Balances clamped at zero instead of going negative.
    pub consistency_warnings: u64,
}

impl IndexerStats {
    pub fn processed(&self) -> u64 {
        self.applied + self.duplicates + self.stale
    }
}

impl AddAssign for IndexerStats {
    fn add_assign(&mut self, rhs: Self) {
        self.batches += rhs.batches;
        self.applied += rhs.applied;
        self.duplicates += rhs.duplicates;
        self.stale += rhs.stale;
        self.consistency_warnings += rhs.consistency_warnings;
    }
}

pub struct Indexer<S, Src>
where
    S: EntityStore,
    Src: EventSource,
{
    store: S,
    source: Src,
    projector: StakingProjector,
    checkpoint: CheckpointTracker,
    batch_size: usize,
    stats: IndexerStats,
    run_id: String,
}

impl<S, Src> Indexer<S, Src>
where
    S: EntityStore,
    Src: EventSource,
{
    /// Build an indexer resuming from the store's checkpoint named `checkpoint_name`.
    pub async fn resume(
        store: S,
        source: Src,
        projector: StakingProjector,
        checkpoint_name: &str,
        batch_size: usize,
    ) -> Result<Self, IndexerError> {
        if batch_size == 0 {
            return Err(IndexerError::Config("batch size must be at least 1".into()));
        }
        let checkpoint = CheckpointTracker::load(&store, checkpoint_name).await?;
        Ok(Self {
            store,
            source,
            projector,
            checkpoint,
            batch_size,
            stats: IndexerStats::default(),
            run_id: uuid::Uuid::new_v4().to_string(),
        })
    }

    /// Process one batch. Returns that batch's counts; `processed() == 0`
    /// means the source had nothing new.
    pub async fn run_once(&mut self) -> Result<IndexerStats, IndexerError> {
        let from = self.checkpoint.position();
        let logs = self.source.read_from(from, self.batch_size).await?;
        if logs.is_empty() {
            return Ok(IndexerStats::default());
        }

        let mut batch = IndexerStats {
            batches: 1,
            ..Default::default()
        };
        let mut uow = UnitOfWork::new();
        let mut last: Option<LogPosition> = None;

        for log in &logs {
            if self.checkpoint.covers(log.position) || last == Some(log.position) {
                debug!(
                    position = %log.position,
                    tx = log.tx_hash.as_str(),
                    user = log.event.user().unwrap_or_default(),
                    "Skipping redelivered log"
                );
                batch.stale += 1;
                continue;
            }
            if let Some(previous) = last {
                if log.position < previous {
                    return Err(IndexerError::OutOfOrder {
                        previous,
                        got: log.position,
                    });
                }
            }

            let refs = self.projector.prefetch_keys(log);
            uow.prefetch(&self.store, &refs)
                .await
                .map_err(IndexerError::Store)?;

            let result = self
                .projector
                .project(&mut uow, log)
                .map_err(|cause| IndexerError::Projection {
                    position: log.position,
                    cause,
                })?;

            match result {
                ApplyResult::Applied => batch.applied += 1,
                ApplyResult::Clamped => {
                    batch.applied += 1;
                    batch.consistency_warnings += 1;
                }
                ApplyResult::Duplicate => batch.duplicates += 1,
            }
            last = Some(log.position);
        }

        let Some(position) = last else {
            // Entire batch was redelivery; the checkpoint already covers it.
            self.stats += batch;
            return Ok(batch);
        };

        let writes = uow.staged_len();
        let write_batch = uow.into_batch(Some((self.checkpoint.name().to_string(), position)));
        self.store
            .commit(write_batch)
            .await
            .map_err(IndexerError::Store)?;
        self.checkpoint.advance(position);

        info!(
            run_id = self.run_id.as_str(),
            checkpoint = %position,
            applied = batch.applied,
            duplicates = batch.duplicates,
            stale = batch.stale,
            writes,
            "Committed batch"
        );
        if batch.consistency_warnings > 0 {
            warn!(
                run_id = self.run_id.as_str(),
                count = batch.consistency_warnings,
                "Batch contained balance underflows clamped to zero"
            );
        }

        self.stats += batch;
        Ok(batch)
    }

    /// Keep processing batches until the source has nothing new.
    pub async fn run_to_end(&mut self) -> Result<IndexerStats, IndexerError> {
        loop {
            let batch = self.run_once().await?;
            if batch.processed() == 0 {
                break;
            }
        }
        info!(
            run_id = self.run_id.as_str(),
            checkpoint = ?self.checkpoint.position().map(|p| p.to_string()),
            applied = self.stats.applied,
            duplicates = self.stats.duplicates,
            stale = self.stats.stale,
            consistency_warnings = self.stats.consistency_warnings,
            "Source drained"
        );
        Ok(self.stats)
    }

    pub fn stats(&self) -> IndexerStats {
        self.stats
    }

    pub fn checkpoint(&self) -> Option<LogPosition> {
        self.checkpoint.position()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}
