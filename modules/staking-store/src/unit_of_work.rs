//! Staged reads and writes for one batch of events.
//!
//! The caller prefetches every entity a transition may touch, then the
//! transition runs synchronously against this overlay. Nothing reaches the
//! store until [`UnitOfWork::into_batch`] is committed.

use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use staking_world::LogPosition;

use crate::entities::{Aggregate, Entity, EntityKind};
use crate::store::{decode, encode, EntityRef, EntityStore, EntityWrite, WriteBatch};

#[derive(Debug, Default)]
pub struct UnitOfWork {
    /// Committed state as read from the store. `None` = known absent.
    snapshot: BTreeMap<(EntityKind, String), Option<serde_json::Value>>,
    staged: BTreeMap<(EntityKind, String), serde_json::Value>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load whichever of `refs` this unit has not seen yet.
    pub async fn prefetch<S: EntityStore + ?Sized>(
        &mut self,
        store: &S,
        refs: &[EntityRef],
    ) -> Result<()> {
        for r in refs {
            let slot = (r.kind, r.key.clone());
            if self.staged.contains_key(&slot) || self.snapshot.contains_key(&slot) {
                continue;
            }
            let body = store.load_raw(r.kind, &r.key).await?;
            self.snapshot.insert(slot, body);
        }
        Ok(())
    }

    /// Seed the snapshot directly (tests, warm caches).
    pub fn prime(
        &mut self,
        kind: EntityKind,
        key: impl Into<String>,
        body: Option<serde_json::Value>,
    ) {
        self.snapshot.insert((kind, key.into()), body);
    }

    fn lookup(&self, kind: EntityKind, key: &str) -> Result<Option<&serde_json::Value>> {
        let slot = (kind, key.to_string());
        if let Some(body) = self.staged.get(&slot) {
            return Ok(Some(body));
        }
        match self.snapshot.get(&slot) {
            Some(body) => Ok(body.as_ref()),
            None => Err(anyhow!("{kind}/{key} read before it was prefetched")),
        }
    }

    pub fn load<E: Entity>(&self, key: &str) -> Result<Option<E>> {
        match self.lookup(E::KIND, key)? {
            Some(body) => Ok(Some(decode::<E>(key, body.clone())?)),
            None => Ok(None),
        }
    }

    pub fn exists<E: Entity>(&self, key: &str) -> Result<bool> {
        Ok(self.lookup(E::KIND, key)?.is_some())
    }

    pub fn get_or_create<A: Aggregate>(&self, key: &str) -> Result<A> {
        Ok(self.load::<A>(key)?.unwrap_or_else(|| A::zeroed(key)))
    }

    /// Stage a full-document upsert. Later saves of the same key replace earlier ones.
    pub fn save<E: Entity>(&mut self, entity: &E) -> Result<()> {
        let EntityWrite { kind, key, body } = encode(entity)?;
        self.staged.insert((kind, key), body);
        Ok(())
    }

    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// Consume the unit into one atomic batch, optionally advancing `checkpoint`.
    pub fn into_batch(self, checkpoint: Option<(String, LogPosition)>) -> WriteBatch {
        let writes = self
            .staged
            .into_iter()
            .map(|((kind, key), body)| EntityWrite { kind, key, body })
            .collect();
        WriteBatch { writes, checkpoint }
    }
}
