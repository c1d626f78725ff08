use staking_world::LogPosition;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexerError {
    /// The source delivered an event kind the handler set does not cover.
    #[error("Unknown event kind {kind:?} at {location}")]
    UnknownEventKind { kind: String, location: String },

    #[error("Malformed event at {location}: {reason}")]
    Malformed { location: String, reason: String },

    #[error("Out-of-order log {got} after {previous}")]
    OutOfOrder {
        previous: LogPosition,
        got: LogPosition,
    },

    #[error("Event source error: {0}")]
    Source(String),

    #[error("Projection failed at {position}: {cause:#}")]
    Projection {
        position: LogPosition,
        cause: anyhow::Error,
    },

    #[error("Store error: {0:#}")]
    Store(anyhow::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}
