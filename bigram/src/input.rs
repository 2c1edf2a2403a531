//! Input discovery and reading.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::error::Result;

/// Entries whose name starts with `_` hold job metadata (`_SUCCESS`, `_logs`)
/// rather than data.
pub fn is_control_entry(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('_'))
            .unwrap_or(false)
}

/// Lists all data files below `root`, recursively, in path order.
pub fn list_input_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_control_entry(e))
    {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    debug!(root = %root.display(), files = files.len(), "listed input");
    Ok(files)
}

/// Reads all lines of one file.
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    let reader = BufReader::new(File::open(path)?);
    let mut lines = Vec::new();
    for line in reader.lines() {
        lines.push(line?);
    }
    Ok(lines)
}

/// Assigns files to `n` splits round-robin. Empty splits are dropped.
pub fn slice_files(files: &[PathBuf], n: usize) -> Vec<Vec<PathBuf>> {
    let n = n.max(1);
    let mut splits: Vec<Vec<PathBuf>> = (0..n).map(|_| Vec::new()).collect();
    for (i, file) in files.iter().enumerate() {
        splits[i % n].push(file.clone());
    }
    splits.retain(|s| !s.is_empty());
    splits
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_lists_recursively_and_skips_control_entries() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("nested/deeper")).unwrap();
        fs::create_dir_all(root.join("_logs")).unwrap();
        fs::write(root.join("a.txt"), "x y\n").unwrap();
        fs::write(root.join("nested/b.txt"), "x y\n").unwrap();
        fs::write(root.join("nested/deeper/c.txt"), "x y\n").unwrap();
        fs::write(root.join("_SUCCESS"), "").unwrap();
        fs::write(root.join("nested/_meta"), "").unwrap();
        fs::write(root.join("_logs/history"), "").unwrap();

        let files = list_input_files(root).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a.txt"),
                PathBuf::from("nested/b.txt"),
                PathBuf::from("nested/deeper/c.txt"),
            ]
        );
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_input_files(&dir.path().join("nope")).is_err());
    }

    #[test]
    fn test_read_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.txt");
        fs::write(&path, "the cat sat\n\nthe cat ran").unwrap();
        assert_eq!(
            read_lines(&path).unwrap(),
            vec!["the cat sat", "", "the cat ran"]
        );
    }

    #[test]
    fn test_slice_files() {
        let files: Vec<PathBuf> = (1..=5).map(|i| PathBuf::from(format!("file{}.txt", i))).collect();
        let splits = slice_files(&files, 3);
        assert_eq!(
            splits,
            vec![
                vec![PathBuf::from("file1.txt"), PathBuf::from("file4.txt")],
                vec![PathBuf::from("file2.txt"), PathBuf::from("file5.txt")],
                vec![PathBuf::from("file3.txt")],
            ]
        );
        assert!(slice_files(&[], 3).is_empty());
    }
}
