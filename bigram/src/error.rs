use std::path::PathBuf;

use thiserror::Error;

use crate::pair::PairKey;

pub type Result<T> = std::result::Result<T, PairsError>;

/// Errors raised by the pairs pipeline and the report readers.
///
/// The reducer variants are invariant violations: they mean the substrate
/// delivered records in an order the frequency reducer cannot normalise.
#[derive(Error, Debug)]
pub enum PairsError {
    /// A key arrived that does not sort strictly after its predecessor.
    #[error("key {current} delivered after {previous}; partition is not sorted")]
    OutOfOrder { previous: PairKey, current: PairKey },

    /// A bigram arrived before any marginal for its left word.
    #[error("bigram {key} has no preceding marginal")]
    MissingMarginal { key: PairKey },

    /// A marginal summed to zero.
    #[error("marginal for {left:?} is zero")]
    ZeroMarginal { left: String },

    /// A report line could not be parsed.
    #[error("{}:{line}: {reason}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("invalid job configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("walking input directory: {0}")]
    Walk(#[from] walkdir::Error),
}
