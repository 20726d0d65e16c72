//! Newline-delimited selection lists.
//!
//! Groups, data types and dates are kept by the presentation layer as plain
//! text files with one entry per line. These helpers read and write them.

use std::path::{Path, PathBuf};

/// Error type for selection list files.
#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    #[error("Failed to read selection file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write selection file {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Split text into trimmed, non-empty entries.
#[must_use]
pub fn parse_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

/// Read a selection list. A missing file is an empty list.
///
/// # Errors
///
/// Returns `SelectionError::ReadError` if the file exists but cannot be read.
pub fn read_list(path: &Path) -> Result<Vec<String>, SelectionError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(parse_list(&content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "Selection file missing, using empty list");
            Ok(Vec::new())
        }
        Err(e) => Err(SelectionError::ReadError {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Write a selection list, one entry per line.
///
/// # Errors
///
/// Returns `SelectionError::WriteError` if the file cannot be written.
pub fn write_list(path: &Path, entries: &[String]) -> Result<(), SelectionError> {
    std::fs::write(path, entries.join("\n")).map_err(|e| SelectionError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}
