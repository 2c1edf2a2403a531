//! Routing of keys to reduce partitions.

use std::hash::Hasher;

use fnv::FnvHasher;

use crate::pair::PairKey;

/// 64 bit FNV-1a over `parts`. Unlike `DefaultHasher` this is stable across
/// processes and builds, so map tasks in different workers agree on routing.
fn ihash(parts: &[&[u8]]) -> u64 {
    let mut hasher = FnvHasher::default();
    for part in parts {
        hasher.write(part);
    }
    hasher.finish()
}

pub trait Partitioner: Send + Sync {
    /// Returns the partition in `[0, partitions)` that `key` belongs in.
    /// `partitions` must be at least 1.
    fn partition(&self, key: &PairKey, partitions: usize) -> usize;
}

/// Routes by the left word only, so a word's marginal and all of its bigrams
/// end up with the same reducer.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeftWordPartitioner;

impl Partitioner for LeftWordPartitioner {
    fn partition(&self, key: &PairKey, partitions: usize) -> usize {
        debug_assert!(partitions > 0, "partition count must be positive");
        (ihash(&[key.left.as_bytes()]) % partitions as u64) as usize
    }
}

/// Routes by the whole key. Only valid for jobs with no cross-key state,
/// i.e. plain bigram counting.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullKeyPartitioner;

impl Partitioner for FullKeyPartitioner {
    fn partition(&self, key: &PairKey, partitions: usize) -> usize {
        debug_assert!(partitions > 0, "partition count must be positive");
        let h = ihash(&[key.left.as_bytes(), b"\t", key.right.as_bytes()]);
        (h % partitions as u64) as usize
    }
}
