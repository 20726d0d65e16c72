//! Scrape run parameters and the worker argument contract.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::process::{WorkerCommand, WorkerProgram};

/// Content categories the scraper can download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataType {
    Images,
    Videos,
    Audios,
    Text,
    Links,
}

impl DataType {
    pub const ALL: [Self; 5] = [
        Self::Images,
        Self::Videos,
        Self::Audios,
        Self::Text,
        Self::Links,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Images => "Images",
            Self::Videos => "Videos",
            Self::Audios => "Audios",
            Self::Text => "Text",
            Self::Links => "Links",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = ValidationError;

    /// Case-insensitive match on the category name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ValidationError::UnknownDataType(s.to_string()))
    }
}

/// Error type for request validation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required selection list was empty.
    #[error("Please select at least one entry in {list}")]
    EmptyList { list: &'static str },
    /// A data type name outside the known set.
    #[error("Unknown data type: {0}")]
    UnknownDataType(String),
    /// A date that is not `YYYY-MM-DD`.
    #[error("Invalid date: {0}")]
    InvalidDate(String),
}

/// Everything a scrape run needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeRequest {
    pub groups: Vec<String>,
    pub data_types: Vec<DataType>,
    pub dates: Vec<NaiveDate>,
    pub target_folder: PathBuf,
    /// Start a transcription run after a successful scrape.
    pub transcribe_after: bool,
}

impl ScrapeRequest {
    #[must_use]
    pub fn new(
        groups: Vec<String>,
        data_types: Vec<DataType>,
        dates: Vec<NaiveDate>,
        target_folder: impl Into<PathBuf>,
    ) -> Self {
        Self {
            groups,
            data_types,
            dates,
            target_folder: target_folder.into(),
            transcribe_after: false,
        }
    }

    #[must_use]
    pub fn transcribe_after(mut self, enabled: bool) -> Self {
        self.transcribe_after = enabled;
        self
    }

    /// Check that every selection list has at least one entry.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyList` naming the first empty list.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.groups.iter().all(|g| g.trim().is_empty()) {
            return Err(ValidationError::EmptyList { list: "groups" });
        }
        if self.data_types.is_empty() {
            return Err(ValidationError::EmptyList { list: "data types" });
        }
        if self.dates.is_empty() {
            return Err(ValidationError::EmptyList { list: "dates" });
        }
        Ok(())
    }

    /// Build the scraper invocation.
    ///
    /// Groups keep their order, data types keep their order without
    /// duplicates, dates are sorted newest first without duplicates.
    #[must_use]
    pub fn to_command(&self, program: &WorkerProgram) -> WorkerCommand {
        let groups: Vec<&str> = self
            .groups
            .iter()
            .map(|g| g.trim())
            .filter(|g| !g.is_empty())
            .collect();

        let mut data_types: Vec<&str> = Vec::with_capacity(self.data_types.len());
        for data_type in &self.data_types {
            if !data_types.contains(&data_type.as_str()) {
                data_types.push(data_type.as_str());
            }
        }

        let mut dates = self.dates.clone();
        dates.sort_unstable_by(|a, b| b.cmp(a));
        dates.dedup();
        let dates: Vec<String> = dates.iter().map(|d| d.format("%Y-%m-%d").to_string()).collect();

        program
            .command()
            .flag("--groups", groups.join(","))
            .flag("--datatypes", data_types.join(","))
            .flag("--dates", dates.join(","))
            .flag("--target_folder", &self.target_folder)
    }
}

/// Parse an ISO `YYYY-MM-DD` date.
///
/// # Errors
///
/// Returns `ValidationError::InvalidDate` for anything else.
pub fn parse_date(s: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDate(s.trim().to_string()))
}

/// Build the transcription invocation for a folder.
#[must_use]
pub fn transcription_command(program: &WorkerProgram, folder: &std::path::Path) -> WorkerCommand {
    program.command().arg(folder)
}

/// Build the repository update invocation.
#[must_use]
pub fn update_command(program: &WorkerProgram, repo: &std::path::Path) -> WorkerCommand {
    program.command().arg(repo)
}
