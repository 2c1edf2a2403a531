//! Reading finished job output back in, and the summaries built on it.
//!
//! Parsing is strict: a malformed line fails the whole read, since silently
//! dropping rows would skew every statistic derived from the report.

use std::cmp::Ordering;
use std::path::Path;

use tracing::debug;

use crate::error::{PairsError, Result};
use crate::input::{list_input_files, read_lines};
use crate::job::JobKind;
use crate::pair::PairKey;
use crate::reducer::OutputRecord;

/// Parses one `<left>\t<right>\t<value>` line of a report written by a job of `kind`.
pub fn parse_line(line: &str, kind: JobKind) -> std::result::Result<OutputRecord, String> {
    let fields: Vec<&str> = line.split('\t').collect();
    let [left, right, value] = fields[..] else {
        return Err(format!(
            "expected 3 tab-separated fields, found {}",
            fields.len()
        ));
    };
    if left.is_empty() {
        return Err("empty left word".to_string());
    }

    let parse_count = |v: &str| {
        v.parse::<u64>()
            .map_err(|e| format!("bad count {:?}: {}", v, e))
    };

    match (kind, right.is_empty()) {
        (JobKind::Frequency, true) => Ok(OutputRecord::Marginal {
            left: left.to_string(),
            count: parse_count(value)?,
        }),
        (JobKind::Frequency, false) => {
            let frequency = value
                .parse::<f64>()
                .map_err(|e| format!("bad frequency {:?}: {}", value, e))?;
            if !(0.0..=1.0).contains(&frequency) {
                return Err(format!("frequency {} outside [0, 1]", frequency));
            }
            Ok(OutputRecord::Frequency {
                left: left.to_string(),
                right: right.to_string(),
                frequency,
            })
        }
        (JobKind::Count, true) => Err("count report line without right word".to_string()),
        (JobKind::Count, false) => Ok(OutputRecord::Count {
            left: left.to_string(),
            right: right.to_string(),
            count: parse_count(value)?,
        }),
    }
}

/// Reads one report file.
pub fn read_report_file(path: &Path, kind: JobKind) -> Result<Vec<OutputRecord>> {
    read_lines(path)?
        .iter()
        .enumerate()
        .map(|(i, line)| {
            parse_line(line, kind).map_err(|reason| PairsError::Parse {
                path: path.to_path_buf(),
                line: i + 1,
                reason,
            })
        })
        .collect()
}

/// Reads every data file of an output directory, skipping `_` entries.
pub fn read_report(dir: &Path, kind: JobKind) -> Result<Vec<OutputRecord>> {
    let mut records = Vec::new();
    for file in list_input_files(dir)? {
        records.extend(read_report_file(&file, kind)?);
    }
    debug!(dir = %dir.display(), records = records.len(), "read report");
    Ok(records)
}

/// The words most likely to follow `word`.
#[derive(Debug, Clone, PartialEq)]
pub struct Followers {
    pub word: String,
    pub marginal: Option<u64>,
    /// `(right, frequency)`, most frequent first; ties by word.
    pub top: Vec<(String, f64)>,
}

pub fn top_followers(records: &[OutputRecord], word: &str, limit: usize) -> Followers {
    let mut marginal = None;
    let mut top = Vec::new();
    for record in records.iter().filter(|r| r.left() == word) {
        match record {
            OutputRecord::Marginal { count, .. } => marginal = Some(*count),
            OutputRecord::Frequency {
                right, frequency, ..
            } => top.push((right.clone(), *frequency)),
            OutputRecord::Count { .. } => {}
        }
    }
    top.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    top.truncate(limit);
    Followers {
        word: word.to_string(),
        marginal,
        top,
    }
}

/// Corpus-wide statistics over a count report.
#[derive(Debug, Clone, PartialEq)]
pub struct CountSummary {
    pub unique: usize,
    pub total: u64,
    pub singletons: usize,
    /// Most frequent bigrams first; ties by key.
    pub top: Vec<(PairKey, u64)>,
}

pub fn summarize_counts(records: &[OutputRecord], limit: usize) -> CountSummary {
    let mut counts: Vec<(PairKey, u64)> = records
        .iter()
        .filter_map(|r| match r {
            OutputRecord::Count { left, right, count } => {
                Some((PairKey::new(left.as_str(), right.as_str()), *count))
            }
            _ => None,
        })
        .collect();
    let total = counts.iter().map(|(_, c)| c).sum();
    let singletons = counts.iter().filter(|(_, c)| *c == 1).count();
    let unique = counts.len();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts.truncate(limit);
    CountSummary {
        unique,
        total,
        singletons,
        top: counts,
    }
}
