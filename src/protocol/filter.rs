//! Presentation filter for worker log output.
//!
//! Workers tend to repeat their own logging prefix and emit periodic speed
//! lines that the supervisor already derives from byte progress. The filter
//! drops those and strips the prefix; it never touches the event stream.

use regex::Regex;

/// Substrings that mark a line as noise.
pub const DEFAULT_SUPPRESSED: &[&str] = &["Download Speed:", "Time Elapsed:", "INFO -"];

/// Leading `2024-01-01 12:00:00,123 - LEVEL - ` style prefix.
const LOG_PREFIX_PATTERN: &str = r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d+,\d+ - \w+ - ";

/// Filters and cleans log text before it is rendered.
#[derive(Debug, Clone)]
pub struct LogFilter {
    suppressed: Vec<String>,
    prefix: Option<Regex>,
}

impl Default for LogFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl LogFilter {
    /// Create a filter with the default suppression list.
    #[must_use]
    pub fn new() -> Self {
        Self::with_suppressed(DEFAULT_SUPPRESSED.iter().map(|s| (*s).to_string()))
    }

    /// Create a filter with a custom suppression list.
    #[must_use]
    pub fn with_suppressed(suppressed: impl IntoIterator<Item = String>) -> Self {
        Self {
            suppressed: suppressed.into_iter().collect(),
            prefix: Regex::new(LOG_PREFIX_PATTERN).ok(),
        }
    }

    /// Returns the cleaned text, or `None` if the line should not be shown.
    #[must_use]
    pub fn apply(&self, text: &str) -> Option<String> {
        if self.suppressed.iter().any(|s| text.contains(s.as_str())) {
            return None;
        }
        let cleaned = match &self.prefix {
            Some(prefix) => prefix.replace(text, "").into_owned(),
            None => text.to_string(),
        };
        if cleaned.trim().is_empty() {
            return None;
        }
        Some(cleaned)
    }
}
