//! One state transition per event kind.
//!
//! Each handler reads and writes only through the [`UnitOfWork`], never
//! suspends, and checks its own idempotency marker (the record it creates
//! under the transaction hash) before touching any aggregate.

use anyhow::Result;
use tracing::{debug, warn};

use staking_store::{
    EmergencyWithdrawal, Protocol, RewardClaimed, RewardRateChange, StakePosition, StakeStatus,
    StakingInitialization, StakingPause, StakingUnpause, TokenRecovery, UnitOfWork, User,
    Withdrawal, PROTOCOL_KEY,
};
use staking_world::{Amount, ChainLog};

use crate::projector::ApplyResult;

fn duplicate(log: &ChainLog) -> Result<ApplyResult> {
    debug!(
        tx = log.tx_hash.as_str(),
        position = %log.position,
        event_type = log.event_type(),
        "Duplicate delivery, record already exists"
    );
    Ok(ApplyResult::Duplicate)
}

/// Flip the position stored under this log's own transaction hash, if any.
fn close_position(uow: &mut UnitOfWork, log: &ChainLog) -> Result<()> {
    if let Some(mut position) = uow.load::<StakePosition>(&log.tx_hash)? {
        if position.mark_withdrawn() {
            uow.save(&position)?;
        }
    }
    Ok(())
}

pub(crate) fn staked(
    uow: &mut UnitOfWork,
    log: &ChainLog,
    user: &str,
    amount: &Amount,
    new_total_staked: &Amount,
    current_reward_rate: &Amount,
) -> Result<ApplyResult> {
    if uow.exists::<StakePosition>(&log.tx_hash)? {
        return duplicate(log);
    }

    let mut account = uow.get_or_create::<User>(user)?;
    account.staked_amount += amount;
    account.last_stake_timestamp = log.timestamp;
    uow.save(&account)?;

    let mut protocol = uow.get_or_create::<Protocol>(PROTOCOL_KEY)?;
    let position = StakePosition {
        id: log.tx_hash.clone(),
        user: account.id.clone(),
        amount: amount.clone(),
        timestamp: log.timestamp,
        unlock_time: log.timestamp.saturating_add(protocol.min_lock_duration),
        total_staked: new_total_staked.clone(),
        current_reward_rate: current_reward_rate.clone(),
        transaction_hash: log.tx_hash.clone(),
        status: StakeStatus::Active,
    };
    uow.save(&position)?;

    protocol.total_staked = new_total_staked.clone();
    protocol.current_reward_rate = current_reward_rate.clone();
    uow.save(&protocol)?;

    Ok(ApplyResult::Applied)
}

pub(crate) fn withdrawn(
    uow: &mut UnitOfWork,
    log: &ChainLog,
    user: &str,
    amount: &Amount,
    new_total_staked: &Amount,
    current_reward_rate: &Amount,
) -> Result<ApplyResult> {
    if uow.exists::<Withdrawal>(&log.tx_hash)? {
        return duplicate(log);
    }

    let mut result = ApplyResult::Applied;
    let mut account = uow.get_or_create::<User>(user)?;
    account.staked_amount = match account.staked_amount.checked_sub(amount) {
        Some(rest) => rest,
        None => {
            warn!(
                user,
                tx = log.tx_hash.as_str(),
                position = %log.position,
                staked = %account.staked_amount,
                withdrawn = %amount,
                "Withdrawal exceeds recorded stake, clamping to zero"
            );
            result = ApplyResult::Clamped;
            Amount::zero()
        }
    };
    uow.save(&account)?;

    uow.save(&Withdrawal {
        id: log.tx_hash.clone(),
        user: account.id.clone(),
        amount: amount.clone(),
        timestamp: log.timestamp,
        total_staked: new_total_staked.clone(),
        current_reward_rate: current_reward_rate.clone(),
    })?;

    close_position(uow, log)?;

    let mut protocol = uow.get_or_create::<Protocol>(PROTOCOL_KEY)?;
    protocol.total_staked = new_total_staked.clone();
    uow.save(&protocol)?;

    Ok(result)
}

pub(crate) fn rewards_claimed(
    uow: &mut UnitOfWork,
    log: &ChainLog,
    user: &str,
    amount: &Amount,
    new_pending_rewards: &Amount,
    total_staked: &Amount,
) -> Result<ApplyResult> {
    if uow.exists::<RewardClaimed>(&log.tx_hash)? {
        return duplicate(log);
    }

    let mut account = uow.get_or_create::<User>(user)?;
    account.pending_rewards = new_pending_rewards.clone();
    uow.save(&account)?;

    uow.save(&RewardClaimed {
        id: log.tx_hash.clone(),
        user: account.id.clone(),
        amount: amount.clone(),
        timestamp: log.timestamp,
        total_staked: total_staked.clone(),
    })?;

    let mut protocol = uow.get_or_create::<Protocol>(PROTOCOL_KEY)?;
    protocol.total_rewards_distributed += amount;
    uow.save(&protocol)?;

    Ok(ApplyResult::Applied)
}

pub(crate) fn emergency_withdrawn(
    uow: &mut UnitOfWork,
    log: &ChainLog,
    user: &str,
    amount: &Amount,
    penalty: &Amount,
    new_total_staked: &Amount,
) -> Result<ApplyResult> {
    if uow.exists::<EmergencyWithdrawal>(&log.tx_hash)? {
        return duplicate(log);
    }

    // Forfeiture: the whole stake is gone regardless of `amount`.
    let mut account = uow.get_or_create::<User>(user)?;
    account.staked_amount = Amount::zero();
    uow.save(&account)?;

    uow.save(&EmergencyWithdrawal {
        id: log.tx_hash.clone(),
        user: account.id.clone(),
        amount: amount.clone(),
        penalty: penalty.clone(),
        timestamp: log.timestamp,
        total_staked: new_total_staked.clone(),
    })?;

    close_position(uow, log)?;

    let mut protocol = uow.get_or_create::<Protocol>(PROTOCOL_KEY)?;
    protocol.total_staked = new_total_staked.clone();
    uow.save(&protocol)?;

    Ok(ApplyResult::Applied)
}

pub(crate) fn reward_rate_updated(
    uow: &mut UnitOfWork,
    log: &ChainLog,
    old_rate: &Amount,
    new_rate: &Amount,
    total_staked: &Amount,
) -> Result<ApplyResult> {
    if uow.exists::<RewardRateChange>(&log.tx_hash)? {
        return duplicate(log);
    }

    let mut protocol = uow.get_or_create::<Protocol>(PROTOCOL_KEY)?;
    protocol.current_reward_rate = new_rate.clone();
    uow.save(&protocol)?;

    uow.save(&RewardRateChange {
        id: log.tx_hash.clone(),
        old_rate: old_rate.clone(),
        new_rate: new_rate.clone(),
        timestamp: log.timestamp,
        total_staked: total_staked.clone(),
    })?;

    Ok(ApplyResult::Applied)
}

pub(crate) fn staking_initialized(
    uow: &mut UnitOfWork,
    log: &ChainLog,
    staking_token: &str,
    initial_reward_rate: &Amount,
    min_lock_duration: u64,
) -> Result<ApplyResult> {
    if uow.exists::<StakingInitialization>(&log.tx_hash)? {
        return duplicate(log);
    }

    uow.save(&StakingInitialization {
        id: log.tx_hash.clone(),
        staking_token: staking_token.to_string(),
        initial_reward_rate: initial_reward_rate.clone(),
        timestamp: log.timestamp,
    })?;

    let mut protocol = uow.get_or_create::<Protocol>(PROTOCOL_KEY)?;
    protocol.current_reward_rate = initial_reward_rate.clone();
    protocol.min_lock_duration = min_lock_duration;
    uow.save(&protocol)?;

    Ok(ApplyResult::Applied)
}

pub(crate) fn staking_paused(uow: &mut UnitOfWork, log: &ChainLog) -> Result<ApplyResult> {
    if uow.exists::<StakingPause>(&log.tx_hash)? {
        return duplicate(log);
    }
    uow.save(&StakingPause {
        id: log.tx_hash.clone(),
        timestamp: log.timestamp,
        transaction_hash: log.tx_hash.clone(),
    })?;
    Ok(ApplyResult::Applied)
}

pub(crate) fn staking_unpaused(uow: &mut UnitOfWork, log: &ChainLog) -> Result<ApplyResult> {
    if uow.exists::<StakingUnpause>(&log.tx_hash)? {
        return duplicate(log);
    }
    uow.save(&StakingUnpause {
        id: log.tx_hash.clone(),
        timestamp: log.timestamp,
        transaction_hash: log.tx_hash.clone(),
    })?;
    Ok(ApplyResult::Applied)
}

pub(crate) fn token_recovered(
    uow: &mut UnitOfWork,
    log: &ChainLog,
    token: &str,
    amount: &Amount,
) -> Result<ApplyResult> {
    if uow.exists::<TokenRecovery>(&log.tx_hash)? {
        return duplicate(log);
    }
    uow.save(&TokenRecovery {
        id: log.tx_hash.clone(),
        token: token.to_string(),
        amount: amount.clone(),
        timestamp: log.timestamp,
    })?;
    Ok(ApplyResult::Applied)
}
