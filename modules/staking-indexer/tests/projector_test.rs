//! Transition rules for each event kind, exercised through the indexer
//! against the in-memory store.

mod common;

use common::*;
use staking_store::{
    EmergencyWithdrawal, EntityKind, EntityStoreExt, Protocol, RewardClaimed, RewardRateChange,
    StakePosition, StakeStatus, StakingInitialization, TokenRecovery, User, Withdrawal,
    DEFAULT_MIN_LOCK_DURATION, PROTOCOL_KEY,
};
use staking_world::StakingEvent;

async fn user(store: &impl EntityStoreExt, key: &str) -> User {
    store.load::<User>(key).await.unwrap().expect("user exists")
}

async fn protocol(store: &impl EntityStoreExt) -> Protocol {
    store.load::<Protocol>(PROTOCOL_KEY).await.unwrap().expect("protocol exists")
}

async fn position(store: &impl EntityStoreExt, tx: &str) -> StakePosition {
    store.load::<StakePosition>(tx).await.unwrap().expect("position exists")
}

// =========================================================================
// Worked example
// =========================================================================

#[tokio::test]
async fn stake_then_claim_example_trace() {
    let (store, stats) = index(vec![
        log(1, 0, "0x1", 1000, staked(ALICE, 100, 100, 5)),
        log(2, 0, "0x2", 1100, claimed(ALICE, 10, 0, 100)),
    ])
    .await;
    assert_eq!(stats.applied, 2);

    let alice = user(&*store, ALICE).await;
    assert_eq!(alice.staked_amount, amt(100));
    assert_eq!(alice.pending_rewards, amt(0));
    assert_eq!(alice.last_stake_timestamp, 1000);

    let stake = position(&*store, "0x1").await;
    assert_eq!(stake.amount, amt(100));
    assert_eq!(stake.unlock_time, 87_400);
    assert_eq!(stake.status, StakeStatus::Active);
    assert_eq!(stake.user, ALICE);
    assert_eq!(stake.total_staked, amt(100));
    assert_eq!(stake.current_reward_rate, amt(5));

    let p = protocol(&*store).await;
    assert_eq!(p.total_staked, amt(100));
    assert_eq!(p.current_reward_rate, amt(5));
    assert_eq!(p.total_rewards_distributed, amt(10));
}

#[tokio::test]
async fn redelivered_stake_is_not_double_counted() {
    let logs = vec![
        log(1, 0, "0x1", 1000, staked(ALICE, 100, 100, 5)),
        log(2, 0, "0x2", 1100, claimed(ALICE, 10, 0, 100)),
    ];
    let (store, _) = index(logs.clone()).await;

    // A second indexer with no checkpoint sees every log again; only the
    // record-presence check stands between it and double counting.
    let stats = index_into(&store, "fresh-checkpoint", logs).await;
    assert_eq!(stats.applied, 0);
    assert_eq!(stats.duplicates, 2);

    assert_eq!(user(&*store, ALICE).await.staked_amount, amt(100));
    assert_eq!(protocol(&*store).await.total_rewards_distributed, amt(10));
    assert_eq!(store.count(EntityKind::StakePosition), 1);
}

// =========================================================================
// Staked / Withdrawn
// =========================================================================

#[tokio::test]
async fn staked_amount_is_the_signed_sum_in_event_order() {
    let (store, _) = index(vec![
        log(1, 0, "0x10", 100, staked(ALICE, 50, 50, 1)),
        log(1, 1, "0x11", 100, staked(ALICE, 30, 80, 1)),
        log(2, 0, "0x12", 200, withdrawn(ALICE, 20, 60, 1)),
        log(3, 0, "0x13", 300, staked(ALICE, 5, 65, 1)),
        log(4, 0, "0x14", 400, withdrawn(ALICE, 35, 30, 1)),
    ])
    .await;

    let alice = user(&*store, ALICE).await;
    assert_eq!(alice.staked_amount, amt(50 + 30 - 20 + 5 - 35));
    assert_eq!(alice.last_stake_timestamp, 300);

    // Never re-derived from position sums: positions still hold their original amounts.
    let positions: Vec<StakePosition> = store.scan_user(ALICE).await.unwrap();
    assert_eq!(positions.len(), 3);
    assert!(positions.iter().all(|p| p.is_active()));
}

#[tokio::test]
async fn total_staked_tracks_last_event_snapshot() {
    let logs = vec![
        log(1, 0, "0x20", 100, staked(ALICE, 10, 1_000, 1)),
        log(2, 0, "0x21", 200, staked(BOB, 10, 7, 1)),
        log(3, 0, "0x22", 300, withdrawn(ALICE, 5, 999, 1)),
        log(4, 0, "0x23", 400, emergency(BOB, 10, 1, 42)),
    ];
    let expected = [1_000u64, 7, 999, 42];

    for n in 1..=logs.len() {
        let (store, _) = index(logs[..n].to_vec()).await;
        // Exact snapshot, not a locally recomputed sum.
        assert_eq!(protocol(&*store).await.total_staked, amt(expected[n - 1]), "prefix {n}");
    }
}

#[tokio::test]
async fn withdrawal_in_staking_tx_closes_position_once() {
    let logs = vec![
        log(1, 0, "0xaa", 100, staked(ALICE, 10, 10, 1)),
        log(1, 1, "0xaa", 100, withdrawn(ALICE, 10, 0, 1)),
    ];
    let (store, _) = index(vec![logs[0].clone()]).await;
    assert_eq!(position(&*store, "0xaa").await.status, StakeStatus::Active);

    index_into(&store, "test", logs.clone()).await;
    assert_eq!(position(&*store, "0xaa").await.status, StakeStatus::Withdrawn);

    // Second application of the same withdrawal is a no-op.
    let stats = index_into(&store, "replay", logs).await;
    assert_eq!(stats.duplicates, 2);
    assert_eq!(position(&*store, "0xaa").await.status, StakeStatus::Withdrawn);
    assert_eq!(user(&*store, ALICE).await.staked_amount, amt(0));
}

#[tokio::test]
async fn withdrawal_looks_up_position_by_its_own_transaction() {
    let (store, _) = index(vec![
        log(1, 0, "0xstake", 100, staked(ALICE, 10, 10, 1)),
        log(2, 0, "0xexit", 200, withdrawn(ALICE, 10, 0, 1)),
    ])
    .await;

    // Different transactions: the original position is left as it was.
    assert_eq!(position(&*store, "0xstake").await.status, StakeStatus::Active);

    let w = store.load::<Withdrawal>("0xexit").await.unwrap().unwrap();
    assert_eq!(w.user, ALICE);
    assert_eq!(w.amount, amt(10));
    assert_eq!(w.total_staked, amt(0));
    assert_eq!(w.current_reward_rate, amt(1));
    assert_eq!(w.timestamp, 200);
}

#[tokio::test]
async fn withdrawal_beyond_stake_clamps_and_warns() {
    let (store, stats) = index(vec![
        log(1, 0, "0x30", 100, staked(ALICE, 10, 10, 1)),
        log(2, 0, "0x31", 200, withdrawn(ALICE, 25, 0, 1)),
    ])
    .await;

    assert_eq!(stats.applied, 2);
    assert_eq!(stats.consistency_warnings, 1);
    assert_eq!(user(&*store, ALICE).await.staked_amount, amt(0));
    assert_eq!(protocol(&*store).await.total_staked, amt(0));
}

#[tokio::test]
async fn withdrawal_for_unknown_user_creates_zeroed_user() {
    let (store, stats) = index(vec![log(1, 0, "0x32", 100, withdrawn(BOB, 3, 0, 1))]).await;
    assert_eq!(stats.consistency_warnings, 1);
    let bob = user(&*store, BOB).await;
    assert!(bob.staked_amount.is_zero());
    assert_eq!(bob.last_stake_timestamp, 0);
}

// =========================================================================
// Rewards
// =========================================================================

#[tokio::test]
async fn claims_replace_pending_and_accumulate_distributed() {
    let (store, _) = index(vec![
        log(1, 0, "0x40", 100, claimed(ALICE, 10, 90, 0)),
        log(2, 0, "0x41", 200, claimed(BOB, 7, 3, 0)),
        log(3, 0, "0x42", 300, claimed(ALICE, 15, 4, 0)),
    ])
    .await;

    assert_eq!(user(&*store, ALICE).await.pending_rewards, amt(4));
    assert_eq!(user(&*store, BOB).await.pending_rewards, amt(3));
    assert_eq!(protocol(&*store).await.total_rewards_distributed, amt(32));

    let claim = store.load::<RewardClaimed>("0x42").await.unwrap().unwrap();
    assert_eq!(claim.amount, amt(15));
    assert_eq!(claim.user, ALICE);
}

#[tokio::test]
async fn duplicate_claim_does_not_grow_distributed() {
    let (store, stats) = index(vec![
        log(1, 0, "0x50", 100, claimed(ALICE, 10, 0, 0)),
        // Same transaction re-emitted at a later position.
        log(2, 0, "0x50", 100, claimed(ALICE, 10, 0, 0)),
    ])
    .await;

    assert_eq!(stats.duplicates, 1);
    assert_eq!(protocol(&*store).await.total_rewards_distributed, amt(10));
}

#[tokio::test]
async fn rate_update_sets_rate_and_records_both_values() {
    let (store, _) = index(vec![
        log(1, 0, "0x60", 100, staked(ALICE, 10, 10, 5)),
        log(
            2,
            0,
            "0x61",
            200,
            StakingEvent::RewardRateUpdated {
                old_rate: amt(5),
                new_rate: amt(8),
                total_staked: amt(10),
            },
        ),
    ])
    .await;

    assert_eq!(protocol(&*store).await.current_reward_rate, amt(8));
    let change = store.load::<RewardRateChange>("0x61").await.unwrap().unwrap();
    assert_eq!((change.old_rate, change.new_rate), (amt(5), amt(8)));
    assert_eq!(change.total_staked, amt(10));
}

// =========================================================================
// Emergency withdrawal
// =========================================================================

#[tokio::test]
async fn emergency_withdrawal_resets_stake_and_keeps_penalty() {
    let (store, _) = index(vec![
        log(1, 0, "0x70", 100, staked(ALICE, 40, 40, 1)),
        log(1, 1, "0x71", 100, staked(ALICE, 60, 100, 1)),
        log(2, 0, "0x72", 200, emergency(ALICE, 90, 10, 0)),
    ])
    .await;

    assert_eq!(user(&*store, ALICE).await.staked_amount, amt(0));
    let record = store.load::<EmergencyWithdrawal>("0x72").await.unwrap().unwrap();
    assert_eq!(record.amount, amt(90));
    assert_eq!(record.penalty, amt(10));
    assert_eq!(record.total_staked, amt(0));
    assert_eq!(protocol(&*store).await.total_staked, amt(0));
}

#[tokio::test]
async fn emergency_withdrawal_in_staking_tx_closes_position() {
    let (store, _) = index(vec![
        log(1, 0, "0x80", 100, staked(ALICE, 40, 40, 1)),
        log(1, 1, "0x80", 100, emergency(ALICE, 36, 4, 0)),
    ])
    .await;
    assert_eq!(position(&*store, "0x80").await.status, StakeStatus::Withdrawn);
}

// =========================================================================
// Administrative events
// =========================================================================

#[tokio::test]
async fn initialization_sets_rate_and_lock_idempotently() {
    let store = std::sync::Arc::new(staking_store::MemoryEntityStore::new());
    let logs = vec![
        log(1, 0, "0x90", 100, initialized(12)),
        log(2, 0, "0x91", 500, staked(ALICE, 1, 1, 12)),
    ];
    let mut indexer = staking_indexer::Indexer::resume(
        store.clone(),
        staking_indexer::MemoryEventSource::new(logs.clone()),
        staking_indexer::StakingProjector::new(3_600),
        "test",
        10,
    )
    .await
    .unwrap();
    indexer.run_to_end().await.unwrap();

    let p = protocol(&*store).await;
    assert_eq!(p.current_reward_rate, amt(12));
    assert_eq!(p.min_lock_duration, 3_600);
    assert_eq!(position(&*store, "0x91").await.unlock_time, 4_100);

    let init = store.load::<StakingInitialization>("0x90").await.unwrap().unwrap();
    assert_eq!(init.initial_reward_rate, amt(12));
    assert_eq!(init.staking_token, "0x70ken");

    // Re-delivery of the initialization leaves the protocol exactly as it was.
    let stats = index_into(&store, "again", vec![logs[0].clone()]).await;
    assert_eq!(stats.duplicates, 1);
    assert_eq!(protocol(&*store).await, p);
}

#[tokio::test]
async fn lock_defaults_to_one_day_before_initialization() {
    let (store, _) = index(vec![log(1, 0, "0x92", 10, staked(ALICE, 1, 1, 1))]).await;
    assert_eq!(protocol(&*store).await.min_lock_duration, DEFAULT_MIN_LOCK_DURATION);
    assert_eq!(position(&*store, "0x92").await.unlock_time, 10 + DEFAULT_MIN_LOCK_DURATION);
}

#[tokio::test]
async fn audit_only_events_leave_aggregates_untouched() {
    let (store, stats) = index(vec![
        log(1, 0, "0xa0", 100, StakingEvent::StakingPaused),
        log(2, 0, "0xa1", 200, StakingEvent::StakingUnpaused),
        log(
            3,
            0,
            "0xa2",
            300,
            StakingEvent::TokenRecovered {
                token: "0xdead".into(),
                amount: amt(77),
            },
        ),
    ])
    .await;

    assert_eq!(stats.applied, 3);
    assert_eq!(store.count(EntityKind::Protocol), 0);
    assert_eq!(store.count(EntityKind::User), 0);
    assert_eq!(store.count(EntityKind::StakingPaused), 1);
    assert_eq!(store.count(EntityKind::StakingUnpaused), 1);

    let recovered = store.load::<TokenRecovery>("0xa2").await.unwrap().unwrap();
    assert_eq!(recovered.amount, amt(77));
    assert_eq!(recovered.timestamp, 300);
}

// =========================================================================
// Redelivery of every kind
// =========================================================================

#[tokio::test]
async fn every_event_kind_is_safe_to_apply_twice() {
    let logs = vec![
        log(1, 0, "0xb0", 100, initialized(5)),
        log(2, 0, "0xb1", 200, staked(ALICE, 50, 50, 5)),
        log(2, 1, "0xb1", 200, withdrawn(ALICE, 10, 40, 5)),
        log(3, 0, "0xb2", 300, claimed(ALICE, 4, 1, 40)),
        log(
            4,
            0,
            "0xb3",
            400,
            StakingEvent::RewardRateUpdated {
                old_rate: amt(5),
                new_rate: amt(9),
                total_staked: amt(40),
            },
        ),
        log(5, 0, "0xb4", 500, StakingEvent::StakingPaused),
        log(6, 0, "0xb5", 600, StakingEvent::StakingUnpaused),
        log(
            7,
            0,
            "0xb6",
            700,
            StakingEvent::TokenRecovered {
                token: "0xdead".into(),
                amount: amt(3),
            },
        ),
        log(8, 0, "0xb7", 800, emergency(ALICE, 36, 4, 0)),
    ];
    let (store, first) = index(logs.clone()).await;
    assert_eq!(first.applied, 9);
    let before = store.dump();

    // A fresh checkpoint name sees the whole history again.
    let again = index_into(&store, "replay", logs).await;
    assert_eq!((again.applied, again.duplicates), (0, 9));
    assert_eq!(store.dump(), before);
}

// =========================================================================
// Address keys
// =========================================================================

#[tokio::test]
async fn checksummed_addresses_are_found_by_any_casing() {
    let (store, _) = index(vec![
        log(1, 0, "0xC0", 100, staked("0xA11CE", 100, 100, 5)),
        log(2, 0, "0xC1", 200, claimed("0xa11CE", 2, 0, 100)),
    ])
    .await;

    assert_eq!(user(&*store, "0xa11ce").await.staked_amount, amt(100));
    assert!(store.load::<User>("0xA11CE").await.unwrap().is_none());

    let view = staking_indexer::user_view(&*store, "0xA11CE")
        .await
        .unwrap()
        .expect("user visible under checksummed address");
    assert_eq!(view.id, "0xa11ce");
    assert_eq!(view.stakes.len(), 1);
    assert_eq!(view.rewards_claimed.len(), 1);
}
