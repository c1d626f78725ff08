//! Entity records: two aggregates, one stake position, and the audit trail.
//!
//! JSON field names are camelCase to match what the read surface serves.
//! Child records reference their parent by key (`user`); no entity stores a
//! list of children.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use staking_world::Amount;

/// Key of the one and only `Protocol` record.
pub const PROTOCOL_KEY: &str = "1";

/// The staking contract's minimum lock, in seconds (one day).
pub const DEFAULT_MIN_LOCK_DURATION: u64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    User,
    Protocol,
    StakePosition,
    Withdrawal,
    RewardClaimed,
    EmergencyWithdrawn,
    RewardRateUpdated,
    StakingInitialized,
    StakingPaused,
    StakingUnpaused,
    TokenRecovered,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::User => "User",
            EntityKind::Protocol => "Protocol",
            EntityKind::StakePosition => "StakePosition",
            EntityKind::Withdrawal => "Withdrawal",
            EntityKind::RewardClaimed => "RewardClaimed",
            EntityKind::EmergencyWithdrawn => "EmergencyWithdrawn",
            EntityKind::RewardRateUpdated => "RewardRateUpdated",
            EntityKind::StakingInitialized => "StakingInitialized",
            EntityKind::StakingPaused => "StakingPaused",
            EntityKind::StakingUnpaused => "StakingUnpaused",
            EntityKind::TokenRecovered => "TokenRecovered",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record addressable in the entity store.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: EntityKind;

    fn key(&self) -> &str;
}

/// An entity that springs into existence, zero-valued, on first reference.
pub trait Aggregate: Entity {
    fn zeroed(key: &str) -> Self;
}

macro_rules! keyed_by_id {
    ($ty:ty, $kind:expr) => {
        impl Entity for $ty {
            const KIND: EntityKind = $kind;

            fn key(&self) -> &str {
                &self.id
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Participant address.
    pub id: String,
    pub staked_amount: Amount,
    pub pending_rewards: Amount,
    pub last_stake_timestamp: u64,
}

impl Aggregate for User {
    fn zeroed(key: &str) -> Self {
        Self {
            id: key.to_string(),
            staked_amount: Amount::zero(),
            pending_rewards: Amount::zero(),
            last_stake_timestamp: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Protocol {
    pub id: String,
    /// Last `newTotalStaked`/`totalStaked` snapshot carried by an event.
    pub total_staked: Amount,
    pub current_reward_rate: Amount,
    pub total_rewards_distributed: Amount,
    /// Seconds.
    pub min_lock_duration: u64,
}

impl Protocol {
    pub fn singleton() -> Self {
        Self::zeroed(PROTOCOL_KEY)
    }
}

impl Aggregate for Protocol {
    fn zeroed(key: &str) -> Self {
        Self {
            id: key.to_string(),
            total_staked: Amount::zero(),
            current_reward_rate: Amount::zero(),
            total_rewards_distributed: Amount::zero(),
            min_lock_duration: DEFAULT_MIN_LOCK_DURATION,
        }
    }
}

keyed_by_id!(User, EntityKind::User);
keyed_by_id!(Protocol, EntityKind::Protocol);

// ---------------------------------------------------------------------------
// Stake position
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StakeStatus {
    Active,
    Withdrawn,
}

/// One stake deposit. Immutable apart from `status`, which moves
/// `active -> withdrawn` once and never back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakePosition {
    /// Transaction hash of the staking transaction.
    pub id: String,
    pub user: String,
    pub amount: Amount,
    pub timestamp: u64,
    /// `timestamp + minLockDuration` as it stood when the stake was recorded.
    pub unlock_time: u64,
    pub total_staked: Amount,
    pub current_reward_rate: Amount,
    pub transaction_hash: String,
    pub status: StakeStatus,
}

impl StakePosition {
    /// Move to `withdrawn`. Returns false when already there.
    pub fn mark_withdrawn(&mut self) -> bool {
        match self.status {
            StakeStatus::Active => {
                self.status = StakeStatus::Withdrawn;
                true
            }
            StakeStatus::Withdrawn => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == StakeStatus::Active
    }
}

keyed_by_id!(StakePosition, EntityKind::StakePosition);

// ---------------------------------------------------------------------------
// Audit records, keyed by transaction hash, never mutated
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Withdrawal {
    pub id: String,
    pub user: String,
    pub amount: Amount,
    pub timestamp: u64,
    pub total_staked: Amount,
    pub current_reward_rate: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardClaimed {
    pub id: String,
    pub user: String,
    pub amount: Amount,
    pub timestamp: u64,
    pub total_staked: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyWithdrawal {
    pub id: String,
    pub user: String,
    pub amount: Amount,
    pub penalty: Amount,
    pub timestamp: u64,
    pub total_staked: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardRateChange {
    pub id: String,
    pub old_rate: Amount,
    pub new_rate: Amount,
    pub timestamp: u64,
    pub total_staked: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakingInitialization {
    pub id: String,
    pub staking_token: String,
    pub initial_reward_rate: Amount,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakingPause {
    pub id: String,
    pub timestamp: u64,
    pub transaction_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakingUnpause {
    pub id: String,
    pub timestamp: u64,
    pub transaction_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecovery {
    pub id: String,
    pub token: String,
    pub amount: Amount,
    pub timestamp: u64,
}

keyed_by_id!(Withdrawal, EntityKind::Withdrawal);
keyed_by_id!(RewardClaimed, EntityKind::RewardClaimed);
keyed_by_id!(EmergencyWithdrawal, EntityKind::EmergencyWithdrawn);
keyed_by_id!(RewardRateChange, EntityKind::RewardRateUpdated);
keyed_by_id!(StakingInitialization, EntityKind::StakingInitialized);
keyed_by_id!(StakingPause, EntityKind::StakingPaused);
keyed_by_id!(StakingUnpause, EntityKind::StakingUnpaused);
keyed_by_id!(TokenRecovery, EntityKind::TokenRecovered);
