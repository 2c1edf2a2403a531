//! Writing partition output.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::Builder;
use tracing::{debug, info};

use crate::error::Result;
use crate::reducer::OutputRecord;

pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// Name of the output file of reduce partition `partition`.
pub fn part_file_name(partition: usize) -> String {
    format!("part-r-{:05}", partition)
}

/// Removes whatever is at `dir` and creates it empty.
pub fn prepare_output_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        info!(dir = %dir.display(), "replacing existing output directory");
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

/// Writes one partition's records. The file appears under its final name only
/// once it is completely written.
pub fn write_partition(dir: &Path, partition: usize, records: &[OutputRecord]) -> Result<PathBuf> {
    let path = dir.join(part_file_name(partition));
    // `_` prefix so a leftover from a crash is skipped as a control entry
    let tmp = Builder::new().prefix("_tmp").tempfile_in(dir)?;
    {
        let mut w = BufWriter::new(tmp.as_file());
        for record in records {
            writeln!(w, "{}", record)?;
        }
        w.flush()?;
    }
    tmp.persist(&path).map_err(|e| e.error)?;
    debug!(path = %path.display(), records = records.len(), "wrote partition");
    Ok(path)
}

pub fn mark_success(dir: &Path) -> Result<()> {
    fs::write(dir.join(SUCCESS_MARKER), b"")?;
    Ok(())
}
