//! # Shard Actor
//!
//! One partition of the cache. Owns a bounded, recency-ordered key/value
//! store behind a private mailbox; all access is by message passing, never
//! by shared mutable state.
//!
//! ## Design Principles
//!
//! 1. **Single Owner**: the spawned task is the only thing that ever
//!    touches `ShardStore`; callers reach it exclusively through
//!    `ShardHandle`'s mailbox.
//! 2. **Intrusive Arena + Free List**: entries live in a dense `Vec<Option<Node>>`
//!    addressed by index, with prev/next links forming the recency list —
//!    no heap pointers, O(1) unlink/relink without a lookup.
//! 3. **Reply Once**: every `ShardRequest` gets exactly one `ShardResponse`
//!    on its caller-supplied oneshot channel.
//! 4. **Cancellation-Aware Sends**: both the mailbox send and the reply
//!    await race the shared cancellation token, so callers never hang past
//!    shutdown.
//!
//! ## Structure Overview
//!
//! ```text
//! ShardHandle (cloneable)
//!   └── mpsc::Sender<ShardRequest>
//!         └── ShardActor (spawned task, sole owner)
//!               └── store: ShardStore
//!                     ├── map: HashMap<Arc<[u8]>, usize>
//!                     ├── nodes: Vec<Option<Node>>
//!                     ├── free: Vec<usize>
//!                     └── head (LRU) / tail (MRU) indices
//! ```

use std::collections::HashMap;

use std::sync::Arc;
use skv_common::protocol::{ShardCommand, ShardResponse};
use skv_common::{Error, Result};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Reference mailbox depth from the specification.
pub const MAILBOX_DEPTH: usize = 100;

/// One message posted to a shard's mailbox.
struct ShardRequest {
    cmd: ShardCommand,
    reply: oneshot::Sender<ShardResponse>,
}

/// A cheaply cloneable handle to a running shard task. This is the only
/// way to reach a shard's data; there is no shared mutex to take instead.
#[derive(Clone)]
pub struct ShardHandle {
    id: usize,
    tx: mpsc::Sender<ShardRequest>,
}

impl ShardHandle {
    /// Shard index this handle routes to, for logging and error messages.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Sends `cmd` to the shard and awaits its reply.
    ///
    /// Cancellation-aware: both the mailbox send (which blocks when the
    /// mailbox is full) and the reply await race the shared cancellation
    /// token, so a fired shutdown signal never leaves a caller hanging.
    pub async fn call(&self, cmd: ShardCommand, cancel: &CancellationToken) -> Result<ShardResponse> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = ShardRequest { cmd, reply: reply_tx };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            send_result = self.tx.send(request) => {
                send_result.map_err(|_| Error::ShardUnavailable { shard: self.id })?;
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            reply = reply_rx => reply.map_err(|_| Error::ShardUnavailable { shard: self.id }),
        }
    }
}

/// Spawns a shard task with the given capacity and returns a handle to it.
///
/// The task runs until `cancel` fires, at which point it exits without
/// draining its mailbox — in-flight requests are simply dropped, matching
/// the specification's shutdown semantics.
pub fn spawn_shard(id: usize, capacity: usize, cancel: CancellationToken) -> ShardHandle {
    let (tx, rx) = mpsc::channel(MAILBOX_DEPTH);
    let actor = ShardActor {
        id,
        store: ShardStore::new(capacity),
        rx,
        cancel,
    };
    tokio::spawn(actor.run());
    ShardHandle { id, tx }
}

struct ShardActor {
    id: usize,
    store: ShardStore,
    rx: mpsc::Receiver<ShardRequest>,
    cancel: CancellationToken,
}

impl ShardActor {
    async fn run(mut self) {
        tracing::debug!(shard = self.id, capacity = self.store.capacity, "shard started");
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::debug!(shard = self.id, "shard cancelled, exiting without draining mailbox");
                    return;
                }
                maybe_req = self.rx.recv() => {
                    let Some(request) = maybe_req else {
                        tracing::debug!(shard = self.id, "shard mailbox closed, exiting");
                        return;
                    };
                    let response = self.store.apply(request.cmd);
                    let _ = request.reply.send(response);
                }
            }
        }
    }
}

/// A single cache entry: value plus per-entry counters.
struct Node {
    key: Arc<[u8]>,
    value: Arc<[u8]>,
    reads: u64,
    writes: u64,
    prev: Option<usize>,
    next: Option<usize>,
}

/// The bounded, recency-ordered store backing one shard.
///
/// `head` is the least-recently-used slot (evicted first), `tail` is the
/// most-recently-used. `touch`/insertion move an entry to the tail; an
/// eviction removes the head.
struct ShardStore {
    capacity: usize,
    map: HashMap<Arc<[u8]>, usize>,
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl ShardStore {
    fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "shard capacity must be at least 1");
        ShardStore {
            capacity,
            map: HashMap::new(),
            nodes: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
        }
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn lru_remove(&mut self, idx: usize) {
        let (prev, next) = {
            let node = self.nodes[idx].as_ref().expect("node exists");
            (node.prev, node.next)
        };

        if let Some(prev_idx) = prev {
            self.nodes[prev_idx].as_mut().expect("node exists").next = next;
        } else {
            self.head = next;
        }

        if let Some(next_idx) = next {
            self.nodes[next_idx].as_mut().expect("node exists").prev = prev;
        } else {
            self.tail = prev;
        }

        let node = self.nodes[idx].as_mut().expect("node exists");
        node.prev = None;
        node.next = None;
    }

    /// Appends `idx` to the tail (most-recently-used end).
    fn lru_push_tail(&mut self, idx: usize) {
        let tail = self.tail;
        {
            let node = self.nodes[idx].as_mut().expect("node exists");
            node.prev = tail;
            node.next = None;
        }

        if let Some(tail_idx) = tail {
            self.nodes[tail_idx].as_mut().expect("node exists").next = Some(idx);
        } else {
            self.head = Some(idx);
        }

        self.tail = Some(idx);
    }

    /// Marks `idx` as recently used; no-op if it is already the tail.
    fn touch(&mut self, idx: usize) {
        if self.tail == Some(idx) {
            return;
        }
        self.lru_remove(idx);
        self.lru_push_tail(idx);
    }

    fn insert_new(&mut self, key: Arc<[u8]>, value: Arc<[u8]>) -> usize {
        let idx = self.free.pop().unwrap_or_else(|| {
            self.nodes.push(None);
            self.nodes.len() - 1
        });

        self.nodes[idx] = Some(Node {
            key: key.clone(),
            value,
            reads: 0,
            writes: 1,
            prev: None,
            next: None,
        });
        self.lru_push_tail(idx);
        self.map.insert(key, idx);
        idx
    }

    fn remove_idx(&mut self, idx: usize) {
        let key = {
            let node = self.nodes[idx].as_ref().expect("node exists");
            node.key.clone()
        };
        self.lru_remove(idx);
        self.nodes[idx] = None;
        self.map.remove(&key);
        self.free.push(idx);
    }

    /// Evicts the least-recently-used entry, if any.
    fn evict_lru(&mut self) {
        if let Some(idx) = self.head {
            self.remove_idx(idx);
        }
    }

    fn get(&mut self, keys: Vec<Arc<[u8]>>) -> ShardResponse {
        let mut found_keys = Vec::new();
        let mut found_values = Vec::new();
        let mut touched = Vec::new();

        for key in keys {
            if let Some(&idx) = self.map.get(&key) {
                let node = self.nodes[idx].as_mut().expect("node exists");
                node.reads += 1;
                found_keys.push(node.key.clone());
                found_values.push(node.value.clone());
                touched.push(idx);
            }
        }

        for idx in touched {
            self.touch(idx);
        }

        ShardResponse::Get { found_keys, found_values }
    }

    fn put(&mut self, keys: Vec<Arc<[u8]>>, values: Vec<Arc<[u8]>>) -> ShardResponse {
        if keys.len() != values.len() {
            return ShardResponse::Error {
                message: Error::PutLengthMismatch.to_string(),
            };
        }

        let mut count = 0usize;
        for (key, value) in keys.into_iter().zip(values) {
            if let Some(&idx) = self.map.get(&key) {
                let node = self.nodes[idx].as_mut().expect("node exists");
                node.value = value;
                node.writes += 1;
                self.touch(idx);
            } else {
                if self.len() == self.capacity {
                    self.evict_lru();
                }
                self.insert_new(key, value);
            }
            count += 1;
        }

        ShardResponse::Put { count }
    }

    fn del_all(&mut self) -> ShardResponse {
        let count = self.len();
        self.map.clear();
        self.nodes.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        ShardResponse::DelAll { count }
    }

    fn apply(&mut self, cmd: ShardCommand) -> ShardResponse {
        match cmd {
            ShardCommand::Get(keys) => self.get(keys),
            ShardCommand::Put(keys, values) => self.put(keys, values),
            ShardCommand::DelAll => self.del_all(),
            ShardCommand::Len => ShardResponse::Len { count: self.len() },
        }
    }
}
