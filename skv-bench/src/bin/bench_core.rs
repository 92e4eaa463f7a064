//! # Core Benchmark Harness
//!
//! Purpose: a dependency-free, repeatable benchmark driver for the sharded
//! dispatcher so baseline throughput and latency can be compared over time.
//!
//! ## Design Principles
//! 1. **Deterministic Workload**: Use a fixed PRNG seed for stable comparisons.
//! 2. **Allocation Control**: Pre-build keys/values to keep setup costs off the hot path.
//! 3. **Batched Dispatch**: Route through the same `Dispatcher::put`/`get` entry
//!    points the HTTP front end uses, not the shard internals directly.

use std::env;
use std::hint::black_box;
use std::time::Instant;

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const DEFAULT_KEY_COUNT: usize = 1 << 16;
const DEFAULT_OP_COUNT: usize = 1_000_000;
const DEFAULT_KEY_SIZE: usize = 16;
const DEFAULT_VALUE_SIZE: usize = 128;
const DEFAULT_SHARD_COUNT: usize = 8;

struct BenchConfig {
    key_count: usize,
    op_count: usize,
    key_size: usize,
    value_size: usize,
    shard_count: usize,
}

impl BenchConfig {
    fn from_args() -> Self {
        let mut args = env::args().skip(1);
        let key_count = parse_usize(args.next(), DEFAULT_KEY_COUNT).max(1);
        let op_count = parse_usize(args.next(), DEFAULT_OP_COUNT);
        let key_size = parse_usize(args.next(), DEFAULT_KEY_SIZE);
        let value_size = parse_usize(args.next(), DEFAULT_VALUE_SIZE);
        let shard_count = parse_usize(args.next(), DEFAULT_SHARD_COUNT).max(1);

        BenchConfig {
            key_count,
            op_count,
            key_size,
            value_size,
            shard_count,
        }
    }
}

fn parse_usize(value: Option<String>, fallback: usize) -> usize {
    value.and_then(|raw| raw.parse().ok()).unwrap_or(fallback)
}

/// Tiny deterministic PRNG used to avoid external dependencies.
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    #[inline]
    fn next_index(&mut self, count: usize) -> usize {
        (self.next_u64() as usize) % count
    }
}

fn write_u64_le(value: u64, buffer: &mut [u8]) {
    let bytes = value.to_le_bytes();
    let copy_len = buffer.len().min(bytes.len());
    buffer[..copy_len].copy_from_slice(&bytes[..copy_len]);
}

fn build_buffers(count: usize, size: usize, seed: u64) -> Vec<Arc<[u8]>> {
    let mut buffers = Vec::with_capacity(count);
    for i in 0..count {
        let mut buffer = vec![0u8; size];
        write_u64_le(seed ^ (i as u64), &mut buffer);
        buffers.push(Arc::from(buffer));
    }
    buffers
}

fn report(label: &str, ops: usize, elapsed: std::time::Duration) {
    let secs = elapsed.as_secs_f64();
    let ops_per_sec = (ops as f64) / secs;
    let nanos_per_op = (secs * 1e9) / (ops as f64);
    println!("{label}: {ops} ops in {secs:.3}s ({ops_per_sec:.0} ops/s, {nanos_per_op:.1} ns/op)");
}

#[tokio::main]
async fn main() {
    let config = BenchConfig::from_args();
    let cancel = CancellationToken::new();

    // Sized so the whole key set fits without triggering eviction, isolating
    // routing/actor overhead from cache-miss effects.
    let shard_capacity = config.key_count / config.shard_count + 1;
    let dispatcher = skv_core::build_cache(config.shard_count, shard_capacity, cancel.clone());

    let keys = build_buffers(config.key_count, config.key_size, 0xA5A5_A5A5_A5A5_A5A5);
    let values = build_buffers(config.key_count, config.value_size, 0x5A5A_5A5A_5A5A_5A5A);

    dispatcher.put(keys.clone(), values.clone()).await;

    println!(
        "keys: count={}, ops={}, key_size={}, value_size={}, shards={}",
        config.key_count, config.op_count, config.key_size, config.value_size, config.shard_count
    );

    let mut rng = XorShift64::new(0x1234_5678_9ABC_DEF0);
    let start = Instant::now();
    for _ in 0..config.op_count {
        let idx = rng.next_index(config.key_count);
        let response = dispatcher.get(vec![keys[idx].clone()], vec![]).await;
        black_box(response);
    }
    report("GET", config.op_count, start.elapsed());

    let mut rng = XorShift64::new(0x0FED_CBA9_8765_4321);
    let start = Instant::now();
    for _ in 0..config.op_count {
        let idx = rng.next_index(config.key_count);
        let response = dispatcher.put(vec![keys[idx].clone()], vec![values[idx].clone()]).await;
        black_box(response);
    }
    report("PUT", config.op_count, start.elapsed());

    cancel.cancel();
}
