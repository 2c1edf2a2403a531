//! Local pre-aggregation before the shuffle.

use std::collections::BTreeMap;

use crate::pair::{CountRecord, PairKey};

/// Sums counts of equal keys within one batch.
///
/// A combiner is an optimization only: the pipeline's output must not depend
/// on whether it ran, how often, or how records were batched.
pub trait Combiner: Send + Sync {
    fn combine(&self, batch: Vec<CountRecord>) -> Vec<CountRecord>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SumCombiner;

impl Combiner for SumCombiner {
    /// Output is one record per distinct key, in key order.
    fn combine(&self, batch: Vec<CountRecord>) -> Vec<CountRecord> {
        let mut sums: BTreeMap<PairKey, u64> = BTreeMap::new();
        for (key, count) in batch {
            *sums.entry(key).or_insert(0) += count;
        }
        sums.into_iter().collect()
    }
}
