//! Keyed persistence for staking aggregates and audit records.
//!
//! Entities are stored as opaque JSON documents addressed by `(kind, key)`.
//! All writes produced while projecting a batch of events are committed as one
//! atomic [`WriteBatch`], together with the checkpoint that batch advances to.

pub mod entities;
pub mod memory;
pub mod postgres;
pub mod store;
pub mod unit_of_work;

pub use entities::{
    Aggregate, EmergencyWithdrawal, Entity, EntityKind, Protocol, RewardClaimed,
    RewardRateChange, StakePosition, StakeStatus, StakingInitialization, StakingPause,
    StakingUnpause, TokenRecovery, User, Withdrawal, DEFAULT_MIN_LOCK_DURATION, PROTOCOL_KEY,
};
pub use memory::MemoryEntityStore;
pub use postgres::PgEntityStore;
pub use store::{Checkpoint, EntityRef, EntityStore, EntityStoreExt, EntityWrite, WriteBatch};
pub use unit_of_work::UnitOfWork;
