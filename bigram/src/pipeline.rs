//! In-process execution of a job: map, combine, partition, sort, reduce.
//!
//! These functions are the building blocks for both the local runner and the
//! distributed worker. `run_sequential` is the single-reducer verification mode;
//! `run_local` scatters over threads the way a cluster would over machines.

use std::iter::Peekable;
use std::path::{Path, PathBuf};
use std::thread;

use tracing::{debug, info};

use crate::error::Result;
use crate::input::{list_input_files, read_lines};
use crate::job::Job;
use crate::output::{mark_success, prepare_output_dir, write_partition};
use crate::pair::{CountRecord, PairKey};
use crate::reducer::OutputRecord;

/// Iterator adapter: groups adjacent records with equal keys into one
/// `(key, counts)` item. The input must be sorted (or at least have equal keys
/// adjacent) for each key to be yielded once.
pub struct GroupedRuns<It: Iterator<Item = CountRecord>> {
    it: Peekable<It>,
}

impl<It: Iterator<Item = CountRecord>> GroupedRuns<It> {
    pub fn new(it: It) -> GroupedRuns<It> {
        GroupedRuns { it: it.peekable() }
    }
}

impl<It: Iterator<Item = CountRecord>> Iterator for GroupedRuns<It> {
    type Item = (PairKey, Vec<u64>);

    fn next(&mut self) -> Option<Self::Item> {
        let (key, first) = self.it.next()?;
        let mut counts = vec![first];
        while let Some((_, count)) = self.it.next_if(|(k, _)| *k == key) {
            counts.push(count);
        }
        Some((key, counts))
    }
}

/// Runs the mapper over one input split and applies the combiner if the job has one.
pub fn map_split<I, S>(job: &Job, lines: I) -> Vec<CountRecord>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut records: Vec<CountRecord> = Vec::new();
    for line in lines {
        job.mapper().map(line.as_ref(), &mut records);
    }
    let emitted = records.len();
    let records = match job.combiner() {
        Some(combiner) => combiner.combine(records),
        None => records,
    };
    debug!(emitted, after_combine = records.len(), "mapped split");
    records
}

/// Distributes records over `job.reducers()` buckets with the job's partitioner.
pub fn partition(job: &Job, records: Vec<CountRecord>) -> Vec<Vec<CountRecord>> {
    let n = job.reducers();
    let mut buckets: Vec<Vec<CountRecord>> = (0..n).map(|_| Vec::new()).collect();
    for record in records {
        let p = job.partitioner().partition(&record.0, n);
        buckets[p].push(record);
    }
    buckets
}

/// Sorts a partition by key, which puts every marginal ahead of its bigrams.
pub fn sort_partition(records: &mut [CountRecord]) {
    records.sort_by(|a, b| a.0.cmp(&b.0));
}

/// Feeds one partition's records to a fresh reducer.
///
/// Output is only returned once the whole partition reduced cleanly, so a
/// failing partition never yields a partial group.
pub fn reduce_partition(job: &Job, mut records: Vec<CountRecord>) -> Result<Vec<OutputRecord>> {
    if job.needs_sorted_input() {
        sort_partition(&mut records);
    }
    let mut reducer = job.new_reducer();
    let mut out: Vec<OutputRecord> = Vec::new();
    for (key, counts) in GroupedRuns::new(records.into_iter()) {
        reducer.reduce(key, &counts, &mut out)?;
    }
    reducer.finish(&mut out)?;
    Ok(out)
}

/// Single-process verification mode: every record goes through one reducer.
pub fn run_sequential<I, S>(job: &Job, lines: I) -> Result<Vec<OutputRecord>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let records = map_split(job, lines);
    reduce_partition(job, records)
}

/// Scatter/gather over threads: one mapper per split, one reducer per partition.
/// Returns the output of each partition, indexed by partition number.
pub fn run_local(job: &Job, splits: Vec<Vec<String>>) -> Result<Vec<Vec<OutputRecord>>> {
    info!(
        splits = splits.len(),
        reducers = job.reducers(),
        kind = ?job.config().kind,
        "running job locally"
    );

    let map_outputs: Vec<Vec<Vec<CountRecord>>> = thread::scope(|s| {
        let handles: Vec<_> = splits
            .into_iter()
            .map(|split| s.spawn(move || partition(job, map_split(job, split))))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    });

    // shuffle
    let mut inputs: Vec<Vec<CountRecord>> = (0..job.reducers()).map(|_| Vec::new()).collect();
    for buckets in map_outputs {
        for (p, mut bucket) in buckets.into_iter().enumerate() {
            inputs[p].append(&mut bucket);
        }
    }

    thread::scope(|s| {
        let handles: Vec<_> = inputs
            .into_iter()
            .map(|input| s.spawn(move || reduce_partition(job, input)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    })
}

/// Runs `job` over every data file below `input` (one split per file) and
/// writes one part file per partition to `output`, replacing its contents.
///
/// `output` is cleared before the job starts, and part files are only written
/// once every partition reduced successfully. A failed run leaves it empty.
pub fn run_dir(job: &Job, input: &Path, output: &Path) -> Result<Vec<PathBuf>> {
    let mut splits = Vec::new();
    for file in list_input_files(input)? {
        splits.push(read_lines(&file)?);
    }
    prepare_output_dir(output)?;
    let partitions = run_local(job, splits)?;

    let mut written = Vec::with_capacity(partitions.len());
    for (p, records) in partitions.iter().enumerate() {
        written.push(write_partition(output, p, records)?);
    }
    mark_success(output)?;
    info!(output = %output.display(), partitions = written.len(), "job finished");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobConfig, JobKind, ReduceMode};

    fn lines(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_grouped_runs() {
        let input = vec![
            (PairKey::marginal("a"), 1),
            (PairKey::marginal("a"), 2),
            (PairKey::new("a", "b"), 1),
            (PairKey::marginal("c"), 4),
            (PairKey::marginal("c"), 1),
        ];
        let grouped: Vec<_> = GroupedRuns::new(input.into_iter()).collect();
        assert_eq!(
            grouped,
            vec![
                (PairKey::marginal("a"), vec![1, 2]),
                (PairKey::new("a", "b"), vec![1]),
                (PairKey::marginal("c"), vec![4, 1]),
            ]
        );
    }

    #[test]
    fn test_sequential_example() {
        let job = Job::new(JobConfig::default()).unwrap();
        let out = run_sequential(&job, ["the cat sat", "the cat ran"]).unwrap();
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
    fn test_empty_input() {
        let job = Job::new(JobConfig::default()).unwrap();
        assert!(run_sequential(&job, Vec::<String>::new()).unwrap().is_empty());
        let job = Job::new(JobConfig::default().set_reducers(3)).unwrap();
        let out = run_local(&job, vec![]).unwrap();
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|p| p.is_empty()));
    }

    #[test]
    fn test_single_word_lines() {
        let job = Job::new(JobConfig::default()).unwrap();
        assert!(run_sequential(&job, ["one", "two", ""]).unwrap().is_empty());
    }

    #[test]
    fn test_local_partitions_hold_whole_groups() {
        let job = Job::new(JobConfig::default().set_reducers(4)).unwrap();
        let splits = vec![
            lines(&["the quick brown fox", "jumps over the lazy dog"]),
            lines(&["the dog sleeps", "a fox runs over the hill"]),
        ];
        let parts = run_local(&job, splits).unwrap();
        for (i, a) in parts.iter().enumerate() {
            for b in parts.iter().skip(i + 1) {
                assert!(a.iter().all(|r| b.iter().all(|s| r.left() != s.left())));
            }
        }
    }

    #[test]
    fn test_sorted_partition_has_marginal_first() {
        let job = Job::new(JobConfig::default().set_reducers(3).set_combine(false)).unwrap();
        let records = map_split(&job, ["b a b c", "a c a b", "c c b a"]);
        for mut part in partition(&job, records) {
            sort_partition(&mut part);
            let mut current: Option<&str> = None;
            for (key, _) in &part {
                if current != Some(key.left.as_str()) {
                    assert!(key.is_marginal(), "group {} does not open with marginal", key.left);
                    current = Some(key.left.as_str());
                }
            }
        }
    }

    #[test]
    fn test_buffered_mode_matches_streaming() {
        let input = ["a b a c", "b a a", "c a b"];
        let streaming = Job::new(JobConfig::default()).unwrap();
        let buffered =
            Job::new(JobConfig::default().set_reduce_mode(ReduceMode::Buffered)).unwrap();
        assert_eq!(
            run_sequential(&streaming, input).unwrap(),
            run_sequential(&buffered, input).unwrap()
        );
    }

    #[test]
    fn test_count_job() {
        let job = Job::new(JobConfig::new(JobKind::Count)).unwrap();
        let out = run_sequential(&job, ["the cat sat", "the cat ran"]).unwrap();
        let lines: Vec<String> = out.iter().map(|r| r.to_string()).collect();
        assert_eq!(lines, vec!["cat\tran\t1", "cat\tsat\t1", "the\tcat\t2"]);
    }
}
