//! Error type shared between the dispatcher and the shard actors.

use thiserror::Error;

/// Result alias used across the cache core.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures that can occur while routing a request to a shard or while a
/// shard processes it.
///
/// Validation failures that never reach a shard (bad command name,
/// mismatched `put` lengths, values supplied on a `get`) are not modeled
/// here — the dispatcher reports those directly in its aggregate response,
/// since they short-circuit before any shard traffic exists to fail.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A shard's mailbox was closed or full when the dispatcher tried to
    /// send a sub-request, or the shard dropped its reply channel without
    /// answering. Both indicate the shard task is gone or unreachable.
    #[error("shard {shard} is unavailable")]
    ShardUnavailable { shard: usize },

    /// A `put` sub-request reached a shard with mismatched keys/values
    /// lengths. Unreachable if the dispatcher partitions correctly; kept
    /// as a defensive check per spec.
    #[error("mismatched keys/values lengths in shard put request")]
    PutLengthMismatch,

    /// The process-wide cancellation signal fired while a request was
    /// still in flight.
    #[error("cache is shutting down")]
    Cancelled,
}
