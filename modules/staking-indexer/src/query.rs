//! Read-only views served to the presentation layer.
//!
//! Point-in-time reads of committed state. A user's stakes and claims are
//! found by scanning on the `user` reference, not through stored child lists.

use anyhow::Result;
use serde::Serialize;
use staking_store::{
    EntityStore, EntityStoreExt, Protocol, RewardClaimed, StakePosition, User, PROTOCOL_KEY,
};
use staking_world::{normalize_hex, Amount};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub staked_amount: Amount,
    pub pending_rewards: Amount,
    pub last_stake_timestamp: u64,
    pub stakes: Vec<StakePosition>,
    pub rewards_claimed: Vec<RewardClaimed>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolView {
    pub total_staked: Amount,
    pub current_reward_rate: Amount,
    pub total_rewards_distributed: Amount,
    pub min_lock_duration: u64,
}

impl From<Protocol> for ProtocolView {
    fn from(p: Protocol) -> Self {
        Self {
            total_staked: p.total_staked,
            current_reward_rate: p.current_reward_rate,
            total_rewards_distributed: p.total_rewards_distributed,
            min_lock_duration: p.min_lock_duration,
        }
    }
}

/// `None` when the address never appeared in an indexed event.
pub async fn user_view<S: EntityStore + ?Sized>(
    store: &S,
    address: &str,
) -> Result<Option<UserView>> {
    let key = normalize_hex(address);
    let Some(user) = store.load::<User>(&key).await? else {
        return Ok(None);
    };

    let mut stakes: Vec<StakePosition> = store.scan_user(&key).await?;
    stakes.sort_by(|a, b| (a.timestamp, &a.id).cmp(&(b.timestamp, &b.id)));

    let mut rewards_claimed: Vec<RewardClaimed> = store.scan_user(&key).await?;
    rewards_claimed.sort_by(|a, b| (a.timestamp, &a.id).cmp(&(b.timestamp, &b.id)));

    Ok(Some(UserView {
        id: user.id,
        staked_amount: user.staked_amount,
        pending_rewards: user.pending_rewards,
        last_stake_timestamp: user.last_stake_timestamp,
        stakes,
        rewards_claimed,
    }))
}

/// The protocol singleton, zero-valued if nothing has been indexed yet.
pub async fn protocol_view<S: EntityStore + ?Sized>(store: &S) -> Result<ProtocolView> {
    let protocol: Protocol = store.get_or_create(PROTOCOL_KEY).await?;
    Ok(protocol.into())
}
