//! # Dispatcher
//!
//! The single entry point client commands go through: validates the
//! command, partitions keys across shards by a seeded hash, fans the
//! sub-requests out concurrently, and folds the replies back into one
//! [`CacheResponse`].
//!
//! Routing uses a process-wide seeded hash (`ahash::RandomState`, fixed at
//! construction) rather than masking to a power of two — shard count is an
//! arbitrary operator-supplied value, not something the dispatcher is free
//! to round up.

use std::collections::BTreeMap;
use std::hash::{BuildHasher, Hasher};

use std::sync::Arc;
use skv_common::protocol::{CacheResponse, ShardCommand, ShardResponse};
use tokio_util::sync::CancellationToken;

use crate::shard::ShardHandle;

/// Routes client commands to shards and aggregates their replies.
pub struct Dispatcher {
    shards: Vec<ShardHandle>,
    hash_state: ahash::RandomState,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(shards: Vec<ShardHandle>, cancel: CancellationToken) -> Self {
        assert!(!shards.is_empty(), "dispatcher requires at least one shard");
        Dispatcher {
            shards,
            hash_state: ahash::RandomState::new(),
            cancel,
        }
    }

    /// Number of shards behind this dispatcher.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn shard_index(&self, key: &[u8]) -> usize {
        let mut hasher = self.hash_state.build_hasher();
        hasher.write(key);
        (hasher.finish() as usize) % self.shards.len()
    }

    /// Groups `keys` (and, if present, their paired `values`) by shard,
    /// preserving each group's relative order.
    fn partition(&self, keys: Vec<Arc<[u8]>>, values: Option<Vec<Arc<[u8]>>>) -> Vec<(Vec<Arc<[u8]>>, Vec<Arc<[u8]>>)> {
        let mut by_shard: Vec<(Vec<Arc<[u8]>>, Vec<Arc<[u8]>>)> = (0..self.shards.len()).map(|_| (Vec::new(), Vec::new())).collect();

        match values {
            Some(values) => {
                for (key, value) in keys.into_iter().zip(values) {
                    let idx = self.shard_index(&key);
                    by_shard[idx].0.push(key);
                    by_shard[idx].1.push(value);
                }
            }
            None => {
                for key in keys {
                    let idx = self.shard_index(&key);
                    by_shard[idx].0.push(key);
                }
            }
        }

        by_shard
    }

    /// Top-level entry point: routes a named client command to its handler.
    /// `command` is matched case-insensitively, mirroring the permissive
    /// HTTP-method-to-command mapping at the front end.
    pub async fn dispatch(&self, command: &str, keys: Vec<Arc<[u8]>>, values: Vec<Arc<[u8]>>) -> CacheResponse {
        match command.to_ascii_lowercase().as_str() {
            "put" => self.put(keys, values).await,
            "get" => self.get(keys, values).await,
            "del" | "delete" => {
                if !keys.is_empty() || !values.is_empty() {
                    return CacheResponse::err("A delete request takes no keys or values");
                }
                self.del_all().await
            }
            other => CacheResponse::err(format!("Unknown request: {other}")),
        }
    }

    /// Stores each key/value pair, routing independently by key.
    ///
    /// Requires equal, nonzero numbers of keys and values; anything else is
    /// rejected before any shard traffic is sent.
    pub async fn put(&self, keys: Vec<Arc<[u8]>>, values: Vec<Arc<[u8]>>) -> CacheResponse {
        if keys.is_empty() || keys.len() != values.len() {
            return CacheResponse::err("For a put request there should be equal nonzero number of keys and values");
        }

        let groups = self.partition(keys, Some(values));
        let calls = groups.into_iter().enumerate().filter(|(_, (ks, _))| !ks.is_empty()).map(|(idx, (ks, vs))| async move {
            let response = self.shards[idx].call(ShardCommand::Put(ks, vs), &self.cancel).await;
            (idx, response)
        });

        let results = futures::future::join_all(calls).await;

        let mut total = 0usize;
        let mut debug = Vec::new();
        let mut errors = Vec::new();
        for (idx, result) in results {
            match result {
                Ok(ShardResponse::Put { count }) => {
                    total += count;
                    debug.push(format!("node {idx}: stored {count} records"));
                }
                Ok(ShardResponse::Error { message }) => errors.push(format!("node {idx} error: {message}")),
                Ok(_) => errors.push(format!("node {idx} error: unexpected shard reply")),
                Err(err) => errors.push(format!("node {idx} error: {err}")),
            }
        }

        if errors.is_empty() {
            CacheResponse::ok_with_debug(format!("{total} key/value pairs are sent to the cache"), debug)
        } else {
            CacheResponse::err(errors)
        }
    }

    /// Looks up each key, silently omitting misses from the result map. An
    /// empty key list is a status probe across all shards rather than a
    /// degenerate lookup.
    pub async fn get(&self, keys: Vec<Arc<[u8]>>, values: Vec<Arc<[u8]>>) -> CacheResponse {
        if !values.is_empty() {
            return CacheResponse::err("For a get request there should be no values, only keys");
        }

        if keys.is_empty() {
            return self.status_probe().await;
        }

        let groups = self.partition(keys, None);
        let calls = groups.into_iter().enumerate().filter(|(_, (ks, _))| !ks.is_empty()).map(|(idx, (ks, _))| async move {
            self.shards[idx].call(ShardCommand::Get(ks), &self.cancel).await
        });

        let results = futures::future::join_all(calls).await;

        let mut result = BTreeMap::new();
        for r in results {
            match r {
                Ok(ShardResponse::Get { found_keys, found_values }) => {
                    for (key, value) in found_keys.into_iter().zip(found_values) {
                        result.insert(String::from_utf8_lossy(&key).into_owned(), String::from_utf8_lossy(&value).into_owned());
                    }
                }
                Ok(_) => {}
                Err(err) => return CacheResponse::err(err.to_string()),
            }
        }

        CacheResponse::ok_result(result)
    }

    /// No keys were supplied on a `get`: report each shard's current size
    /// instead of a lookup result.
    async fn status_probe(&self) -> CacheResponse {
        let mut lines = Vec::with_capacity(self.shards.len());
        for (idx, shard) in self.shards.iter().enumerate() {
            let result = shard.call(ShardCommand::Len, &self.cancel).await;
            match result {
                Ok(ShardResponse::Len { count }) => lines.push(format!("node {idx:03} length {count}")),
                Ok(_) => lines.push(format!("node {idx:03} length unknown")),
                Err(err) => {
                    tracing::warn!(shard = idx, error = %err, "status probe could not reach shard");
                    lines.push(format!("node {idx:03} unreachable"));
                }
            }
        }

        CacheResponse::ok(lines)
    }

    /// Empties every shard, returning the total number of entries removed.
    /// Safe to call repeatedly; an already-empty cache reports zero.
    pub async fn del_all(&self) -> CacheResponse {
        let calls = self.shards.iter().map(|shard| shard.call(ShardCommand::DelAll, &self.cancel));
        let results = futures::future::join_all(calls).await;

        let mut total = 0usize;
        for result in results {
            match result {
                Ok(ShardResponse::DelAll { count }) => total += count,
                Ok(_) => {}
                Err(err) => return CacheResponse::err(err.to_string()),
            }
        }

        CacheResponse::ok(format!("{total} cache entries deleted"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shard::spawn_shard;

    fn dispatcher(shard_count: usize, capacity: usize) -> (Dispatcher, CancellationToken) {
        let cancel = CancellationToken::new();
        let shards = (0..shard_count).map(|id| spawn_shard(id, capacity, cancel.clone())).collect();
        (Dispatcher::new(shards, cancel.clone()), cancel)
    }

    fn b(s: &str) -> Arc<[u8]> {
        Arc::from(s.as_bytes())
    }

    #[tokio::test]
    async fn put_then_get_round_trip_across_shards() {
        let (dispatcher, cancel) = dispatcher(3, 50);

        let keys = vec![b("a"), b("b"), b("c"), b("d")];
        let values = vec![b("1"), b("2"), b("3"), b("4")];
        let resp = dispatcher.put(keys.clone(), values).await;
        assert!(matches!(resp.status, skv_common::protocol::Status::Ok));

        let resp = dispatcher.get(keys, vec![]).await;
        let result = resp.result.unwrap();
        assert_eq!(result.get("a").unwrap(), "1");
        assert_eq!(result.get("d").unwrap(), "4");

        cancel.cancel();
    }

    #[tokio::test]
    async fn put_rejects_mismatched_lengths() {
        let (dispatcher, cancel) = dispatcher(2, 10);
        let resp = dispatcher.put(vec![b("a"), b("b")], vec![b("1")]).await;
        assert!(matches!(resp.status, skv_common::protocol::Status::Error));
        cancel.cancel();
    }

    #[tokio::test]
    async fn get_rejects_values() {
        let (dispatcher, cancel) = dispatcher(2, 10);
        let resp = dispatcher.get(vec![b("a")], vec![b("1")]).await;
        assert!(matches!(resp.status, skv_common::protocol::Status::Error));
        cancel.cancel();
    }

    #[tokio::test]
    async fn get_with_no_keys_probes_every_shard() {
        let (dispatcher, cancel) = dispatcher(3, 10);
        dispatcher.put(vec![b("a")], vec![b("1")]).await;
        let resp = dispatcher.get(vec![], vec![]).await;
        let message = resp.message.unwrap();
        match message {
            skv_common::protocol::MessageBody::List(lines) => assert_eq!(lines.len(), 3),
            _ => panic!("expected a status probe list"),
        }
        cancel.cancel();
    }

    #[tokio::test]
    async fn del_all_empties_every_shard_and_is_idempotent() {
        let (dispatcher, cancel) = dispatcher(3, 10);
        dispatcher.put(vec![b("a"), b("b"), b("c")], vec![b("1"), b("2"), b("3")]).await;
        let first = dispatcher.del_all().await;
        let second = dispatcher.del_all().await;
        assert_eq!(first.message.unwrap().to_string(), "3 cache entries deleted");
        assert_eq!(second.message.unwrap().to_string(), "0 cache entries deleted");
        cancel.cancel();
    }

    #[tokio::test]
    async fn missing_keys_are_silently_omitted_from_get() {
        let (dispatcher, cancel) = dispatcher(3, 10);
        dispatcher.put(vec![b("a")], vec![b("1")]).await;
        let resp = dispatcher.get(vec![b("a"), b("nope")], vec![]).await;
        let result = resp.result.unwrap();
        assert_eq!(result.len(), 1);
        assert!(result.contains_key("a"));
        cancel.cancel();
    }

    #[tokio::test]
    async fn dispatch_routes_unknown_commands_to_an_error() {
        let (dispatcher, cancel) = dispatcher(1, 10);
        let resp = dispatcher.dispatch("explode", vec![], vec![]).await;
        assert!(matches!(resp.status, skv_common::protocol::Status::Error));
        cancel.cancel();
    }

    #[tokio::test]
    async fn many_shards_round_trip_every_key_with_no_loss_or_duplication() {
        let (dispatcher, cancel) = dispatcher(10, 3);

        let keys: Vec<_> = (0..10).map(|i| b(&format!("key{i}"))).collect();
        let values: Vec<_> = (0..10).map(|i| b(&format!("value{i}"))).collect();

        let resp = dispatcher.put(keys.clone(), values.clone()).await;
        assert!(matches!(resp.status, skv_common::protocol::Status::Ok));

        let resp = dispatcher.get(keys, vec![]).await;
        let result = resp.result.unwrap();
        assert_eq!(result.len(), 10);
        for i in 0..10 {
            assert_eq!(result.get(&format!("key{i}")).unwrap(), &format!("value{i}"));
        }
        cancel.cancel();
    }

    #[tokio::test]
    async fn shard_routing_is_stable_across_repeated_calls() {
        let (dispatcher, cancel) = dispatcher(7, 50);
        let keys: Vec<_> = (0..50).map(|i| b(&format!("k{i}"))).collect();
        let first_pass: Vec<usize> = keys.iter().map(|k| dispatcher.shard_index(k)).collect();
        let second_pass: Vec<usize> = keys.iter().map(|k| dispatcher.shard_index(k)).collect();
        assert_eq!(first_pass, second_pass);
        cancel.cancel();
    }
}
