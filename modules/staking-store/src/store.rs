//! The entity store contract and the atomic write set it commits.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use staking_world::LogPosition;

use crate::entities::{Aggregate, Entity, EntityKind};

/// Address of one entity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub key: String,
}

impl EntityRef {
    pub fn new(kind: EntityKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }

    pub fn of<E: Entity>(key: impl Into<String>) -> Self {
        Self::new(E::KIND, key)
    }
}

/// A full-document upsert.
#[derive(Debug, Clone)]
pub struct EntityWrite {
    pub kind: EntityKind,
    pub key: String,
    pub body: serde_json::Value,
}

/// Everything one batch of events wants durably visible, all or nothing.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    pub writes: Vec<EntityWrite>,
    /// Named checkpoint to advance in the same commit.
    pub checkpoint: Option<(String, LogPosition)>,
}

impl WriteBatch {
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.checkpoint.is_none()
    }

    pub fn with_checkpoint(mut self, name: impl Into<String>, position: LogPosition) -> Self {
        self.checkpoint = Some((name.into(), position));
        self
    }
}

/// The last position durably committed under a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub name: String,
    pub position: LogPosition,
    pub updated_at: DateTime<Utc>,
}

/// Keyed JSON persistence.
///
/// Implemented by `PgEntityStore` (postgres) and `MemoryEntityStore` (tests).
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Fetch one entity document, or `None` if it was never written.
    async fn load_raw(&self, kind: EntityKind, key: &str) -> Result<Option<serde_json::Value>>;

    /// All documents of `kind` whose `user` field equals `user`, ordered by key.
    async fn scan_by_user(&self, kind: EntityKind, user: &str) -> Result<Vec<serde_json::Value>>;

    async fn checkpoint(&self, name: &str) -> Result<Option<Checkpoint>>;

    /// Apply every write and the checkpoint advance atomically.
    async fn commit(&self, batch: WriteBatch) -> Result<()>;
}

/// Typed access on top of [`EntityStore`].
#[async_trait]
pub trait EntityStoreExt: EntityStore {
    async fn load<E: Entity>(&self, key: &str) -> Result<Option<E>> {
        match self.load_raw(E::KIND, key).await? {
            Some(body) => Ok(Some(decode::<E>(key, body)?)),
            None => Ok(None),
        }
    }

    /// Existing entity, or its zero-valued form (not persisted until saved).
    async fn get_or_create<A: Aggregate>(&self, key: &str) -> Result<A> {
        Ok(self.load::<A>(key).await?.unwrap_or_else(|| A::zeroed(key)))
    }

    /// Upsert a single entity in its own commit.
    async fn save<E: Entity>(&self, entity: &E) -> Result<()> {
        let write = encode(entity)?;
        self.commit(WriteBatch {
            writes: vec![write],
            checkpoint: None,
        })
        .await
    }

    async fn scan_user<E: Entity>(&self, user: &str) -> Result<Vec<E>> {
        self.scan_by_user(E::KIND, user)
            .await?
            .into_iter()
            .map(|body| decode::<E>(user, body))
            .collect()
    }
}

impl<S: EntityStore + ?Sized> EntityStoreExt for S {}

pub(crate) fn encode<E: Entity>(entity: &E) -> Result<EntityWrite> {
    let body = serde_json::to_value(entity)
        .with_context(|| format!("serializing {}/{}", E::KIND, entity.key()))?;
    Ok(EntityWrite {
        kind: E::KIND,
        key: entity.key().to_string(),
        body,
    })
}

pub(crate) fn decode<E: Entity>(key: &str, body: serde_json::Value) -> Result<E> {
    serde_json::from_value(body).with_context(|| format!("decoding {}/{key}", E::KIND))
}
