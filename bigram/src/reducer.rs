//! The reduce phase.
//!
//! A reducer instance owns one partition's key stream. It is driven
//! sequentially and is not meant to be shared between threads.

use std::collections::BTreeMap;
use std::fmt;

use tracing::trace;

use crate::emit::Emit;
use crate::error::{PairsError, Result};
use crate::pair::PairKey;

/// One line of job output.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputRecord {
    /// Total number of bigrams starting with `left`.
    Marginal { left: String, count: u64 },
    /// `count(left, right) / marginal(left)`.
    Frequency { left: String, right: String, frequency: f64 },
    /// Raw bigram count, produced by the count job.
    Count { left: String, right: String, count: u64 },
}

impl OutputRecord {
    pub fn left(&self) -> &str {
        match self {
            OutputRecord::Marginal { left, .. }
            | OutputRecord::Frequency { left, .. }
            | OutputRecord::Count { left, .. } => left,
        }
    }
}

impl fmt::Display for OutputRecord {
    /// `<left>\t<right>\t<value>`. Frequencies use the `Debug` float format so
    /// they always carry a decimal point and parse back to the same value.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputRecord::Marginal { left, count } => write!(f, "{}\t\t{}", left, count),
            OutputRecord::Frequency {
                left,
                right,
                frequency,
            } => write!(f, "{}\t{}\t{:?}", left, right, frequency),
            OutputRecord::Count { left, right, count } => {
                write!(f, "{}\t{}\t{}", left, right, count)
            }
        }
    }
}

/// Consumes one partition, one distinct key at a time.
pub trait GroupReducer: Send {
    /// Called with a key and all counts delivered for it.
    fn reduce(&mut self, key: PairKey, counts: &[u64], em: &mut dyn Emit<OutputRecord>)
        -> Result<()>;

    /// Called once after the last key of the partition.
    fn finish(&mut self, _em: &mut dyn Emit<OutputRecord>) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug)]
enum GroupState {
    AwaitingMarginal,
    HaveMarginal { left: String, marginal: u64 },
}

/// Normalises bigram counts by a running marginal.
///
/// Relies on keys arriving in ascending order, which puts each marginal ahead
/// of its bigrams. Any deviation is reported as an error instead of producing
/// a frequency against a stale marginal.
#[derive(Debug)]
pub struct FrequencyReducer {
    state: GroupState,
    previous: Option<PairKey>,
}

impl FrequencyReducer {
    pub fn new() -> FrequencyReducer {
        FrequencyReducer {
            state: GroupState::AwaitingMarginal,
            previous: None,
        }
    }

    fn check_order(&mut self, key: &PairKey) -> Result<()> {
        if let Some(previous) = self.previous.take() {
            if previous >= *key {
                return Err(PairsError::OutOfOrder {
                    previous,
                    current: key.clone(),
                });
            }
            if previous.left != key.left {
                self.state = GroupState::AwaitingMarginal;
            }
        }
        self.previous = Some(key.clone());
        Ok(())
    }
}

impl Default for FrequencyReducer {
    fn default() -> Self {
        FrequencyReducer::new()
    }
}

impl GroupReducer for FrequencyReducer {
    fn reduce(
        &mut self,
        key: PairKey,
        counts: &[u64],
        em: &mut dyn Emit<OutputRecord>,
    ) -> Result<()> {
        self.check_order(&key)?;
        let sum: u64 = counts.iter().sum();

        if key.is_marginal() {
            if sum == 0 {
                return Err(PairsError::ZeroMarginal { left: key.left });
            }
            trace!(left = %key.left, marginal = sum, "entering group");
            self.state = GroupState::HaveMarginal {
                left: key.left.clone(),
                marginal: sum,
            };
            em.emit(OutputRecord::Marginal {
                left: key.left,
                count: sum,
            });
            return Ok(());
        }

        match &self.state {
            GroupState::HaveMarginal { left, marginal } if *left == key.left => {
                em.emit(OutputRecord::Frequency {
                    frequency: sum as f64 / *marginal as f64,
                    left: key.left,
                    right: key.right,
                });
                Ok(())
            }
            _ => Err(PairsError::MissingMarginal { key }),
        }
    }
}

#[derive(Debug, Default)]
struct BufferedGroup {
    marginal: u64,
    seen_marginal: bool,
    bigrams: BTreeMap<String, u64>,
}

/// Frequency reducer that holds the whole partition before emitting.
///
/// Accepts keys in any order and keys split over several calls, at the cost
/// of keeping every group in memory until `finish`.
#[derive(Debug, Default)]
pub struct BufferedFrequencyReducer {
    groups: BTreeMap<String, BufferedGroup>,
}

impl BufferedFrequencyReducer {
    pub fn new() -> BufferedFrequencyReducer {
        BufferedFrequencyReducer::default()
    }
}

impl GroupReducer for BufferedFrequencyReducer {
    fn reduce(
        &mut self,
        key: PairKey,
        counts: &[u64],
        _em: &mut dyn Emit<OutputRecord>,
    ) -> Result<()> {
        let sum: u64 = counts.iter().sum();
        let group = self.groups.entry(key.left).or_default();
        if key.right.is_empty() {
            group.marginal += sum;
            group.seen_marginal = true;
        } else {
            *group.bigrams.entry(key.right).or_insert(0) += sum;
        }
        Ok(())
    }

    fn finish(&mut self, em: &mut dyn Emit<OutputRecord>) -> Result<()> {
        for (left, group) in std::mem::take(&mut self.groups) {
            if !group.seen_marginal {
                // Report the smallest bigram of the group.
                let right = group.bigrams.into_keys().next().unwrap_or_default();
                return Err(PairsError::MissingMarginal {
                    key: PairKey::new(left, right),
                });
            }
            if group.marginal == 0 {
                return Err(PairsError::ZeroMarginal { left });
            }
            em.emit(OutputRecord::Marginal {
                left: left.clone(),
                count: group.marginal,
            });
            for (right, count) in group.bigrams {
                em.emit(OutputRecord::Frequency {
                    left: left.clone(),
                    right,
                    frequency: count as f64 / group.marginal as f64,
                });
            }
        }
        Ok(())
    }
}

/// Sums counts per key; output of the count job.
#[derive(Debug, Default)]
pub struct CountReducer;

impl GroupReducer for CountReducer {
    fn reduce(
        &mut self,
        key: PairKey,
        counts: &[u64],
        em: &mut dyn Emit<OutputRecord>,
    ) -> Result<()> {
        em.emit(OutputRecord::Count {
            left: key.left,
            right: key.right,
            count: counts.iter().sum(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(
        reducer: &mut dyn GroupReducer,
        input: Vec<(PairKey, Vec<u64>)>,
    ) -> Result<Vec<OutputRecord>> {
        let mut out: Vec<OutputRecord> = Vec::new();
        for (key, counts) in input {
            reducer.reduce(key, &counts, &mut out)?;
        }
        reducer.finish(&mut out)?;
        Ok(out)
    }

    fn cat_group() -> Vec<(PairKey, Vec<u64>)> {
        vec![
            (PairKey::marginal("cat"), vec![1, 1]),
            (PairKey::new("cat", "ran"), vec![1]),
            (PairKey::new("cat", "sat"), vec![1]),
            (PairKey::marginal("the"), vec![2]),
            (PairKey::new("the", "cat"), vec![1, 1]),
        ]
    }

    #[test]
    fn test_frequency_reducer_example() {
        let out = feed(&mut FrequencyReducer::new(), cat_group()).unwrap();
        let lines: Vec<String> = out.iter().map(|r| r.to_string()).collect();
        assert_eq!(
            lines,
            vec![
                "cat\t\t2",
                "cat\tran\t0.5",
                "cat\tsat\t0.5",
                "the\t\t2",
                "the\tcat\t1.0",
            ]
        );
    }

    #[test]
    fn test_bigram_before_marginal_fails() {
        let input = vec![
            (PairKey::new("cat", "ran"), vec![1]),
            (PairKey::marginal("cat"), vec![1]),
        ];
        let err = feed(&mut FrequencyReducer::new(), input).unwrap_err();
        assert!(matches!(err, PairsError::MissingMarginal { .. }));
    }

    #[test]
    fn test_unsorted_keys_fail() {
        let input = vec![
            (PairKey::marginal("the"), vec![1]),
            (PairKey::new("the", "cat"), vec![1]),
            (PairKey::marginal("cat"), vec![1]),
        ];
        let err = feed(&mut FrequencyReducer::new(), input).unwrap_err();
        assert!(matches!(err, PairsError::OutOfOrder { .. }));
    }

    #[test]
    fn test_duplicate_key_fails() {
        let input = vec![
            (PairKey::marginal("a"), vec![1]),
            (PairKey::marginal("a"), vec![1]),
        ];
        let err = feed(&mut FrequencyReducer::new(), input).unwrap_err();
        assert!(matches!(err, PairsError::OutOfOrder { .. }));
    }

    #[test]
    fn test_marginal_of_other_word_is_not_reused() {
        // "b" has bigrams but its marginal was routed elsewhere.
        let input = vec![
            (PairKey::marginal("a"), vec![3]),
            (PairKey::new("a", "x"), vec![3]),
            (PairKey::new("b", "x"), vec![1]),
        ];
        let err = feed(&mut FrequencyReducer::new(), input).unwrap_err();
        match err {
            PairsError::MissingMarginal { key } => assert_eq!(key, PairKey::new("b", "x")),
            e => panic!("unexpected error {}", e),
        }
    }

    #[test]
    fn test_zero_marginal_fails() {
        let input = vec![(PairKey::marginal("a"), vec![0])];
        let err = feed(&mut FrequencyReducer::new(), input).unwrap_err();
        assert!(matches!(err, PairsError::ZeroMarginal { .. }));
    }

    #[test]
    fn test_empty_partition() {
        assert!(feed(&mut FrequencyReducer::new(), vec![]).unwrap().is_empty());
        assert!(feed(&mut BufferedFrequencyReducer::new(), vec![])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_buffered_matches_streaming_on_sorted_input() {
        let streaming = feed(&mut FrequencyReducer::new(), cat_group()).unwrap();
        let buffered = feed(&mut BufferedFrequencyReducer::new(), cat_group()).unwrap();
        assert_eq!(streaming, buffered);
    }

    #[test]
    fn test_buffered_tolerates_disorder_and_split_keys() {
        let mut input = cat_group();
        input.reverse();
        input.push((PairKey::new("cat", "ran"), vec![0]));
        let out = feed(&mut BufferedFrequencyReducer::new(), input).unwrap();
        assert_eq!(out, feed(&mut FrequencyReducer::new(), cat_group()).unwrap());
    }

    #[test]
    fn test_buffered_missing_marginal_fails() {
        let input = vec![(PairKey::new("dog", "ran"), vec![1])];
        let err = feed(&mut BufferedFrequencyReducer::new(), input).unwrap_err();
        assert!(matches!(err, PairsError::MissingMarginal { .. }));
    }

    #[test]
    fn test_count_reducer() {
        let input = vec![
            (PairKey::new("a", "b"), vec![1, 2, 3]),
            (PairKey::new("b", "c"), vec![1]),
        ];
        let out = feed(&mut CountReducer, input).unwrap();
        let lines: Vec<String> = out.iter().map(|r| r.to_string()).collect();
        assert_eq!(lines, vec!["a\tb\t6", "b\tc\t1"]);
    }
}
