//! StakingProjector: routes each chain log to its transition.
//!
//! Both `match` blocks below are exhaustive over [`StakingEvent`]: adding a
//! kind to the vocabulary fails to compile until it has a handler and a
//! prefetch list.

use anyhow::Result;
use tracing::trace;

use staking_store::{
    EmergencyWithdrawal, EntityRef, Protocol, RewardClaimed, RewardRateChange, StakePosition,
    StakingInitialization, StakingPause, StakingUnpause, TokenRecovery, UnitOfWork, User,
    Withdrawal, DEFAULT_MIN_LOCK_DURATION, PROTOCOL_KEY,
};
use staking_world::{ChainLog, StakingEvent};

use crate::handlers;

/// Result of applying a single event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyResult {
    /// The event's writes were staged.
    Applied,
    /// Staged, but a balance would have gone negative and was clamped at zero.
    Clamped,
    /// The event's record already exists; nothing was staged.
    Duplicate,
}

#[derive(Debug, Clone)]
pub struct StakingProjector {
    /// Lock duration written to the protocol on `StakingInitialized`.
    min_lock_duration: u64,
}

impl Default for StakingProjector {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_LOCK_DURATION)
    }
}

impl StakingProjector {
    pub fn new(min_lock_duration: u64) -> Self {
        Self { min_lock_duration }
    }

    /// Every entity the transition for `log` may read.
    pub fn prefetch_keys(&self, log: &ChainLog) -> Vec<EntityRef> {
        let tx = log.tx_hash.as_str();
        let protocol = EntityRef::of::<Protocol>(PROTOCOL_KEY);
        match &log.event {
            StakingEvent::Staked { user, .. } => vec![
                EntityRef::of::<StakePosition>(tx),
                EntityRef::of::<User>(user.as_str()),
                protocol,
            ],
            StakingEvent::Withdrawn { user, .. } => vec![
                EntityRef::of::<Withdrawal>(tx),
                EntityRef::of::<User>(user.as_str()),
                EntityRef::of::<StakePosition>(tx),
                protocol,
            ],
            StakingEvent::RewardsClaimed { user, .. } => vec![
                EntityRef::of::<RewardClaimed>(tx),
                EntityRef::of::<User>(user.as_str()),
                protocol,
            ],
            StakingEvent::EmergencyWithdrawn { user, .. } => vec![
                EntityRef::of::<EmergencyWithdrawal>(tx),
                EntityRef::of::<User>(user.as_str()),
                EntityRef::of::<StakePosition>(tx),
                protocol,
            ],
            StakingEvent::RewardRateUpdated { .. } => {
                vec![EntityRef::of::<RewardRateChange>(tx), protocol]
            }
            StakingEvent::StakingInitialized { .. } => {
                vec![EntityRef::of::<StakingInitialization>(tx), protocol]
            }
            StakingEvent::StakingPaused => vec![EntityRef::of::<StakingPause>(tx)],
            StakingEvent::StakingUnpaused => vec![EntityRef::of::<StakingUnpause>(tx)],
            StakingEvent::TokenRecovered { .. } => vec![EntityRef::of::<TokenRecovery>(tx)],
        }
    }

    /// Apply one log to the unit of work. Deterministic; safe to repeat.
    pub fn project(&self, uow: &mut UnitOfWork, log: &ChainLog) -> Result<ApplyResult> {
        trace!(
            position = %log.position,
            tx = log.tx_hash.as_str(),
            event_type = log.event_type(),
            "Projecting"
        );

        match &log.event {
            StakingEvent::Staked {
                user,
                amount,
                new_total_staked,
                current_reward_rate,
            } => handlers::staked(uow, log, user, amount, new_total_staked, current_reward_rate),

            StakingEvent::Withdrawn {
                user,
                amount,
                new_total_staked,
                current_reward_rate,
            } => handlers::withdrawn(uow, log, user, amount, new_total_staked, current_reward_rate),

            StakingEvent::RewardsClaimed {
                user,
                amount,
                new_pending_rewards,
                total_staked,
            } => handlers::rewards_claimed(
                uow,
                log,
                user,
                amount,
                new_pending_rewards,
                total_staked,
            ),

            StakingEvent::EmergencyWithdrawn {
                user,
                amount,
                penalty,
                new_total_staked,
            } => handlers::emergency_withdrawn(uow, log, user, amount, penalty, new_total_staked),

            StakingEvent::RewardRateUpdated {
                old_rate,
                new_rate,
                total_staked,
            } => handlers::reward_rate_updated(uow, log, old_rate, new_rate, total_staked),

            StakingEvent::StakingInitialized {
                staking_token,
                initial_reward_rate,
            } => handlers::staking_initialized(
                uow,
                log,
                staking_token,
                initial_reward_rate,
                self.min_lock_duration,
            ),

            StakingEvent::StakingPaused => handlers::staking_paused(uow, log),

            StakingEvent::StakingUnpaused => handlers::staking_unpaused(uow, log),

            StakingEvent::TokenRecovered { token, amount } => {
                handlers::token_recovered(uow, log, token, amount)
            }
        }
    }
}
