//! Shared fixtures for indexer integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use staking_indexer::{Indexer, IndexerStats, MemoryEventSource, StakingProjector};
use staking_store::MemoryEntityStore;
use staking_world::{Amount, ChainLog, LogPosition, StakingEvent};

pub const ALICE: &str = "0xa11ce";
pub const BOB: &str = "0xb0b";

pub fn amt(v: u64) -> Amount {
    Amount::from(v)
}

pub fn log(block: u64, index: u64, tx: &str, timestamp: u64, event: StakingEvent) -> ChainLog {
    ChainLog::new(LogPosition::new(block, index), tx, timestamp, event)
}

pub fn staked(user: &str, amount: u64, new_total: u64, rate: u64) -> StakingEvent {
    StakingEvent::Staked {
        user: user.into(),
        amount: amt(amount),
        new_total_staked: amt(new_total),
        current_reward_rate: amt(rate),
    }
}

pub fn withdrawn(user: &str, amount: u64, new_total: u64, rate: u64) -> StakingEvent {
    StakingEvent::Withdrawn {
        user: user.into(),
        amount: amt(amount),
        new_total_staked: amt(new_total),
        current_reward_rate: amt(rate),
    }
}

pub fn claimed(user: &str, amount: u64, new_pending: u64, total: u64) -> StakingEvent {
    StakingEvent::RewardsClaimed {
        user: user.into(),
        amount: amt(amount),
        new_pending_rewards: amt(new_pending),
        total_staked: amt(total),
    }
}

pub fn emergency(user: &str, amount: u64, penalty: u64, new_total: u64) -> StakingEvent {
    StakingEvent::EmergencyWithdrawn {
        user: user.into(),
        amount: amt(amount),
        penalty: amt(penalty),
        new_total_staked: amt(new_total),
    }
}

pub fn initialized(rate: u64) -> StakingEvent {
    StakingEvent::StakingInitialized {
        staking_token: "0x70ken".into(),
        initial_reward_rate: amt(rate),
    }
}

/// Run `logs` to the end against `store` under checkpoint `name`.
pub async fn index_into(
    store: &Arc<MemoryEntityStore>,
    name: &str,
    logs: Vec<ChainLog>,
) -> IndexerStats {
    let mut indexer = Indexer::resume(
        store.clone(),
        MemoryEventSource::new(logs),
        StakingProjector::default(),
        name,
        100,
    )
    .await
    .unwrap();
    indexer.run_to_end().await.unwrap()
}

/// Fresh store with `logs` indexed.
pub async fn index(logs: Vec<ChainLog>) -> (Arc<MemoryEntityStore>, IndexerStats) {
    let store = Arc::new(MemoryEntityStore::new());
    let stats = index_into(&store, "test", logs).await;
    (store, stats)
}
