//! The staking protocol's on-chain event vocabulary.
//!
//! Every variant is a fact emitted by the staking contract and observed by an
//! upstream chain reader. No derived state lives here; projections into
//! aggregates happen in `staking-indexer`.

pub mod eventlike;
pub mod events;
pub mod values;

pub use eventlike::Eventlike;
pub use events::{ChainLog, StakingEvent};
pub use values::{normalize_hex, Amount, LogPosition};
