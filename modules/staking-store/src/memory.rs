//! In-memory entity store. No database required.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use crate::entities::EntityKind;
use crate::store::{Checkpoint, EntityStore, WriteBatch};

#[derive(Debug, Default)]
struct MemoryState {
    entities: BTreeMap<(EntityKind, String), serde_json::Value>,
    checkpoints: HashMap<String, Checkpoint>,
}

/// Thread-safe in-memory store. A commit applies under a single lock, so
/// readers see a batch entirely or not at all.
#[derive(Debug, Default)]
pub struct MemoryEntityStore {
    state: Mutex<MemoryState>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entities of `kind` (for test assertions).
    pub fn count(&self, kind: EntityKind) -> usize {
        self.state
            .lock()
            .unwrap()
            .entities
            .keys()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    /// Every stored document, in `(kind, key)` order.
    pub fn dump(&self) -> Vec<(EntityKind, String, serde_json::Value)> {
        self.state
            .lock()
            .unwrap()
            .entities
            .iter()
            .map(|((kind, key), body)| (*kind, key.clone(), body.clone()))
            .collect()
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn load_raw(&self, kind: EntityKind, key: &str) -> Result<Option<serde_json::Value>> {
        let state = self.state.lock().unwrap();
        Ok(state.entities.get(&(kind, key.to_string())).cloned())
    }

    async fn scan_by_user(&self, kind: EntityKind, user: &str) -> Result<Vec<serde_json::Value>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .entities
            .iter()
            .filter(|((k, _), body)| {
                *k == kind && body.get("user").and_then(|u| u.as_str()) == Some(user)
            })
            .map(|(_, body)| body.clone())
            .collect())
    }

    async fn checkpoint(&self, name: &str) -> Result<Option<Checkpoint>> {
        Ok(self.state.lock().unwrap().checkpoints.get(name).cloned())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        for write in batch.writes {
            state.entities.insert((write.kind, write.key), write.body);
        }
        if let Some((name, position)) = batch.checkpoint {
            let checkpoint = Checkpoint {
                name: name.clone(),
                position,
                updated_at: Utc::now(),
            };
            state.checkpoints.insert(name, checkpoint);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Arc<S> blanket, lets tests keep a handle for assertions
// ---------------------------------------------------------------------------

#[async_trait]
impl<S: EntityStore + ?Sized> EntityStore for Arc<S> {
    async fn load_raw(&self, kind: EntityKind, key: &str) -> Result<Option<serde_json::Value>> {
        (**self).load_raw(kind, key).await
    }

    async fn scan_by_user(&self, kind: EntityKind, user: &str) -> Result<Vec<serde_json::Value>> {
        (**self).scan_by_user(kind, user).await
    }

    async fn checkpoint(&self, name: &str) -> Result<Option<Checkpoint>> {
        (**self).checkpoint(name).await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        (**self).commit(batch).await
    }
}
