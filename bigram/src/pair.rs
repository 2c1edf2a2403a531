//! The aggregation key of the pairs pattern.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An ordered `(left, right)` word pair.
///
/// An empty `right` denotes the marginal record of `left`. The derived `Ord`
/// compares `left` first and `right` second, both byte-lexicographically, so
/// the marginal is always the first key of its left word's group in any sorted
/// stream. The frequency reducer depends on that.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PairKey {
    pub left: String,
    pub right: String,
}

impl PairKey {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> PairKey {
        PairKey {
            left: left.into(),
            right: right.into(),
        }
    }

    /// The marginal key `(left, "")`.
    pub fn marginal(left: impl Into<String>) -> PairKey {
        PairKey::new(left, String::new())
    }

    pub fn is_marginal(&self) -> bool {
        self.right.is_empty()
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.left, self.right)
    }
}

/// A count-unit record.
pub type CountRecord = (PairKey, u64);
