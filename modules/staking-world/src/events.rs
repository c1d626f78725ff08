//! Facts emitted by the staking contract.
//!
//! Parameters mirror the contract's event signatures. The transaction hash and
//! block timestamp are not event parameters on-chain, so they travel on the
//! [`ChainLog`] envelope instead.

use serde::{Deserialize, Serialize};

use crate::eventlike::Eventlike;
use crate::values::{hex_key, normalize_hex, Amount, LogPosition};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StakingEvent {
    /// A participant locked tokens into the contract.
    Staked {
        #[serde(deserialize_with = "hex_key")]
        user: String,
        amount: Amount,
        new_total_staked: Amount,
        current_reward_rate: Amount,
    },

    /// A participant took staked tokens back out after the lock expired.
    Withdrawn {
        #[serde(deserialize_with = "hex_key")]
        user: String,
        amount: Amount,
        new_total_staked: Amount,
        current_reward_rate: Amount,
    },

    /// A participant collected accrued rewards. `new_pending_rewards` is what
    /// the contract still owes them afterwards.
    RewardsClaimed {
        #[serde(deserialize_with = "hex_key")]
        user: String,
        amount: Amount,
        new_pending_rewards: Amount,
        total_staked: Amount,
    },

    /// A participant exited early, forfeiting `penalty` and their whole stake.
    EmergencyWithdrawn {
        #[serde(deserialize_with = "hex_key")]
        user: String,
        amount: Amount,
        penalty: Amount,
        new_total_staked: Amount,
    },

    RewardRateUpdated {
        old_rate: Amount,
        new_rate: Amount,
        total_staked: Amount,
    },

    /// Contract deployment. Expected once per deployment.
    StakingInitialized {
        #[serde(deserialize_with = "hex_key")]
        staking_token: String,
        initial_reward_rate: Amount,
    },

    StakingPaused,

    StakingUnpaused,

    /// The owner swept a stray ERC-20 balance out of the contract.
    TokenRecovered {
        #[serde(deserialize_with = "hex_key")]
        token: String,
        amount: Amount,
    },
}

impl StakingEvent {
    /// Every `type` tag this vocabulary understands.
    pub const EVENT_TYPES: [&'static str; 9] = [
        "staked",
        "withdrawn",
        "rewards_claimed",
        "emergency_withdrawn",
        "reward_rate_updated",
        "staking_initialized",
        "staking_paused",
        "staking_unpaused",
        "token_recovered",
    ];

    pub fn is_known_type(event_type: &str) -> bool {
        Self::EVENT_TYPES.contains(&event_type)
    }

    /// Lowercase every address field so entity keys are case-stable no
    /// matter how the event was built (EIP-55 checksummed input included).
    pub fn normalized(mut self) -> Self {
        match &mut self {
            StakingEvent::Staked { user, .. }
            | StakingEvent::Withdrawn { user, .. }
            | StakingEvent::RewardsClaimed { user, .. }
            | StakingEvent::EmergencyWithdrawn { user, .. } => *user = normalize_hex(user),
            StakingEvent::StakingInitialized { staking_token, .. } => {
                *staking_token = normalize_hex(staking_token)
            }
            StakingEvent::TokenRecovered { token, .. } => *token = normalize_hex(token),
            StakingEvent::RewardRateUpdated { .. }
            | StakingEvent::StakingPaused
            | StakingEvent::StakingUnpaused => {}
        }
        self
    }

    /// The participant this event is about, if any.
    pub fn user(&self) -> Option<&str> {
        match self {
            StakingEvent::Staked { user, .. }
            | StakingEvent::Withdrawn { user, .. }
            | StakingEvent::RewardsClaimed { user, .. }
            | StakingEvent::EmergencyWithdrawn { user, .. } => Some(user),
            StakingEvent::RewardRateUpdated { .. }
            | StakingEvent::StakingInitialized { .. }
            | StakingEvent::StakingPaused
            | StakingEvent::StakingUnpaused
            | StakingEvent::TokenRecovered { .. } => None,
        }
    }
}

impl Eventlike for StakingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StakingEvent::Staked { .. } => "staked",
            StakingEvent::Withdrawn { .. } => "withdrawn",
            StakingEvent::RewardsClaimed { .. } => "rewards_claimed",
            StakingEvent::EmergencyWithdrawn { .. } => "emergency_withdrawn",
            StakingEvent::RewardRateUpdated { .. } => "reward_rate_updated",
            StakingEvent::StakingInitialized { .. } => "staking_initialized",
            StakingEvent::StakingPaused => "staking_paused",
            StakingEvent::StakingUnpaused => "staking_unpaused",
            StakingEvent::TokenRecovered { .. } => "token_recovered",
        }
    }
}

/// One decoded contract log as delivered by the chain reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainLog {
    #[serde(flatten)]
    pub position: LogPosition,
    #[serde(deserialize_with = "hex_key")]
    pub tx_hash: String,
    /// Block timestamp, unix seconds.
    pub timestamp: u64,
    pub event: StakingEvent,
}

impl ChainLog {
    pub fn new(
        position: LogPosition,
        tx_hash: impl AsRef<str>,
        timestamp: u64,
        event: StakingEvent,
    ) -> Self {
        Self {
            position,
            tx_hash: normalize_hex(tx_hash.as_ref()),
            timestamp,
            event: event.normalized(),
        }
    }

    pub fn event_type(&self) -> &'static str {
        self.event.event_type()
    }
}
