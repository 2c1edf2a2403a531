//! Conditional bigram frequencies over a partitioned corpus, computed with
//! the MapReduce "pairs" pattern.
//!
//! Every adjacent word pair `(w1, w2)` is emitted together with a marginal
//! record `(w1, "")`. Partitioning by `w1` and sorting by `(left, right)` puts
//! each marginal in front of its bigrams, so a reducer can normalise counts
//! into `P(w2 | w1)` while streaming. The pipeline runs in-process
//! ([`pipeline`]) or over a tarpc coordinator and workers ([`coordinator`],
//! [`worker`]).

pub mod combiner;
pub mod coordinator;
pub mod emit;
pub mod error;
pub mod input;
pub mod job;
pub mod logging;
pub mod mapper;
pub mod output;
pub mod pair;
pub mod partitioner;
pub mod pipeline;
pub mod reducer;
pub mod report;
pub mod rpc;
pub mod task;
pub mod worker;

pub use error::{PairsError, Result};
pub use job::{Job, JobConfig, JobKind, ReduceMode};
pub use pair::{CountRecord, PairKey};
pub use reducer::OutputRecord;
