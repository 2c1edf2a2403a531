//! Job parameters and the components they select.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::combiner::{Combiner, SumCombiner};
use crate::error::{PairsError, Result};
use crate::mapper::{BigramMapper, Mapper};
use crate::partitioner::{FullKeyPartitioner, LeftWordPartitioner, Partitioner};
use crate::reducer::{BufferedFrequencyReducer, CountReducer, FrequencyReducer, GroupReducer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum JobKind {
    /// Relative frequency of each bigram given its left word.
    Frequency,
    /// Raw bigram counts.
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum ReduceMode {
    /// Normalise while streaming; requires sorted partitions.
    Streaming,
    /// Buffer each partition first; tolerates unsorted partitions.
    Buffered,
}

/// Parameters of one job run. Sent to workers by the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    pub kind: JobKind,
    pub reducers: usize,
    pub combine: bool,
    pub reduce_mode: ReduceMode,
}

impl Default for JobConfig {
    fn default() -> Self {
        JobConfig {
            kind: JobKind::Frequency,
            reducers: 1,
            combine: true,
            reduce_mode: ReduceMode::Streaming,
        }
    }
}

impl JobConfig {
    pub fn new(kind: JobKind) -> JobConfig {
        JobConfig {
            kind,
            ..JobConfig::default()
        }
    }

    /// Number of reduce partitions. Default 1.
    pub fn set_reducers(mut self, n: usize) -> JobConfig {
        self.reducers = n;
        self
    }

    /// Whether map output is pre-aggregated per split. Default true.
    pub fn set_combine(mut self, combine: bool) -> JobConfig {
        self.combine = combine;
        self
    }

    /// Only affects the frequency job. Default streaming.
    pub fn set_reduce_mode(mut self, mode: ReduceMode) -> JobConfig {
        self.reduce_mode = mode;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.reducers == 0 {
            return Err(PairsError::Config(
                "number of reducers must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// The four pipeline components for one job.
pub struct Job {
    config: JobConfig,
    mapper: Box<dyn Mapper>,
    combiner: Option<Box<dyn Combiner>>,
    partitioner: Box<dyn Partitioner>,
}

impl Job {
    pub fn new(config: JobConfig) -> Result<Job> {
        config.validate()?;
        let (mapper, partitioner): (Box<dyn Mapper>, Box<dyn Partitioner>) = match config.kind {
            JobKind::Frequency => (
                Box::new(BigramMapper::with_marginals()),
                Box::new(LeftWordPartitioner),
            ),
            JobKind::Count => (
                Box::new(BigramMapper::counts_only()),
                Box::new(FullKeyPartitioner),
            ),
        };
        let combiner: Option<Box<dyn Combiner>> = if config.combine {
            Some(Box::new(SumCombiner))
        } else {
            None
        };
        Ok(Job {
            config,
            mapper,
            combiner,
            partitioner,
        })
    }

    /// Replaces the partitioner, e.g. to exercise a routing that splits groups.
    pub fn with_partitioner(mut self, partitioner: Box<dyn Partitioner>) -> Job {
        self.partitioner = partitioner;
        self
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    pub fn reducers(&self) -> usize {
        self.config.reducers
    }

    pub fn mapper(&self) -> &dyn Mapper {
        self.mapper.as_ref()
    }

    pub fn combiner(&self) -> Option<&dyn Combiner> {
        self.combiner.as_deref()
    }

    pub fn partitioner(&self) -> &dyn Partitioner {
        self.partitioner.as_ref()
    }

    /// Whether the reducer needs its partition in key order.
    pub fn needs_sorted_input(&self) -> bool {
        !(self.config.kind == JobKind::Frequency && self.config.reduce_mode == ReduceMode::Buffered)
    }

    /// A fresh reducer for one partition.
    pub fn new_reducer(&self) -> Box<dyn GroupReducer> {
        match (self.config.kind, self.config.reduce_mode) {
            (JobKind::Frequency, ReduceMode::Streaming) => Box::new(FrequencyReducer::new()),
            (JobKind::Frequency, ReduceMode::Buffered) => Box::new(BufferedFrequencyReducer::new()),
            (JobKind::Count, _) => Box::new(CountReducer),
        }
    }
}
