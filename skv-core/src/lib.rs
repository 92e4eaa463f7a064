//! skv-core - the sharded, bounded, LRU-evicting cache itself: one actor
//! task per shard, and a dispatcher that routes and fans requests out
//! across them.

pub mod dispatcher;
pub mod shard;

pub use dispatcher::Dispatcher;
pub use shard::{spawn_shard, ShardHandle};

use tokio_util::sync::CancellationToken;

/// Builds a dispatcher fronting `shard_count` shards, each capped at
/// `shard_capacity` entries, all sharing `cancel` for coordinated shutdown.
pub fn build_cache(shard_count: usize, shard_capacity: usize, cancel: CancellationToken) -> Dispatcher {
    let shards = (0..shard_count).map(|id| spawn_shard(id, shard_capacity, cancel.clone())).collect();
    Dispatcher::new(shards, cancel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn build_cache_wires_up_the_requested_shard_count() {
        let cancel = CancellationToken::new();
        let cache = build_cache(4, 10, cancel.clone());
        assert_eq!(cache.shard_count(), 4);
        cancel.cancel();
    }
}
