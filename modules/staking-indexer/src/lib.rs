//! Projects the staking contract's event log into queryable aggregates.
//!
//! Logs arrive in `(block_number, log_index)` order from an [`EventSource`].
//! The [`StakingProjector`] turns each into entity writes staged in a unit of
//! work, and the [`Indexer`] commits a whole batch together with its
//! checkpoint.

pub mod checkpoint;
pub mod config;
pub mod error;
mod handlers;
pub mod indexer;
pub mod projector;
pub mod query;
pub mod source;

pub use checkpoint::CheckpointTracker;
pub use config::Config;
pub use error::IndexerError;
pub use indexer::{Indexer, IndexerStats};
pub use projector::{ApplyResult, StakingProjector};
pub use query::{protocol_view, user_view, ProtocolView, UserView};
pub use source::{EventSource, JsonLinesSource, MemoryEventSource};
