//! The map phase: turns text lines into count-unit records.

use crate::emit::Emit;
use crate::pair::{CountRecord, PairKey};

pub trait Mapper: Send + Sync {
    /// Takes one input line and emits zero or more count-unit records.
    /// Implementations must not keep per-line state between calls.
    fn map(&self, line: &str, em: &mut dyn Emit<CountRecord>);
}

/// Emits one record per adjacent token pair and, if `marginals` is set, one
/// `(left, "")` record alongside each of them.
#[derive(Debug, Clone, Copy)]
pub struct BigramMapper {
    marginals: bool,
}

impl BigramMapper {
    /// Mapper for the frequency job.
    pub fn with_marginals() -> BigramMapper {
        BigramMapper { marginals: true }
    }

    /// Mapper for the plain count job.
    pub fn counts_only() -> BigramMapper {
        BigramMapper { marginals: false }
    }
}

impl Mapper for BigramMapper {
    fn map(&self, line: &str, em: &mut dyn Emit<CountRecord>) {
        let mut words = line.split_whitespace();
        let Some(mut prev) = words.next() else {
            return;
        };

        for word in words {
            em.emit((PairKey::new(prev, word), 1));
            if self.marginals {
                em.emit((PairKey::marginal(prev), 1));
            }
            prev = word;
        }
    }
}
