//! Typed events produced from worker output.
//!
//! Every line a worker writes is turned into at most one [`Event`] by the
//! classifier. The supervisor and controller add their own `Log` and
//! `Completed` events to the same stream.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity attached to a log record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Info => "INFO",
            Self::Success => "SUCCESS",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Kind of credential a worker is asking for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputKind {
    Phone,
    Code,
    Password,
    /// Any kind text outside the known set, kept verbatim.
    Unknown(String),
}

impl InputKind {
    /// Parse the text following `GUI_NEEDS_INPUT:`.
    #[must_use]
    pub fn parse(kind: &str) -> Self {
        match kind {
            "PHONE" => Self::Phone,
            "CODE" => Self::Code,
            "PASSWORD" => Self::Password,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Returns true for the kinds a prompt handler knows how to collect.
    #[must_use]
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }

    /// Returns true if the collected value should be masked on entry.
    #[must_use]
    pub fn is_secret(&self) -> bool {
        matches!(self, Self::Password)
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Phone => f.write_str("PHONE"),
            Self::Code => f.write_str("CODE"),
            Self::Password => f.write_str("PASSWORD"),
            Self::Unknown(kind) => f.write_str(kind),
        }
    }
}

/// A log line as it should be presented to a log sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub text: String,
    pub level: LogLevel,
}

impl LogRecord {
    #[must_use]
    pub fn new(text: impl Into<String>, level: LogLevel) -> Self {
        Self {
            text: text.into(),
            level,
        }
    }
}

/// Events flowing from a supervised worker to the consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Message produced by the supervising side.
    Log { text: String, level: LogLevel },
    /// The worker blocks until one line of input arrives.
    InputRequest { kind: InputKind },
    /// The worker signed in.
    AuthSuccess,
    /// The worker could not sign in.
    AuthFailure { reason: String },
    /// One file of `n` bytes finished downloading.
    ByteProgress { n: u64 },
    /// Ordinary worker output.
    PlainLine { text: String },
    /// The worker exited. Always the last event of a run.
    Completed {
        /// `None` when the process was killed by a signal.
        exit_code: Option<i32>,
        /// True if termination was requested through the supervisor.
        stopped_by_user: bool,
    },
}

impl Event {
    /// Shorthand for a `Log` event.
    #[must_use]
    pub fn log(text: impl Into<String>, level: LogLevel) -> Self {
        Self::Log {
            text: text.into(),
            level,
        }
    }

    /// Returns true if this is the terminal event of a run.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// How this event presents to a log sink, if at all.
    ///
    /// Plain lines always surface as INFO records. Byte progress never does.
    #[must_use]
    pub fn log_record(&self) -> Option<LogRecord> {
        match self {
            Self::Log { text, level } => Some(LogRecord::new(text.clone(), *level)),
            Self::PlainLine { text } => Some(LogRecord::new(text.clone(), LogLevel::Info)),
            Self::InputRequest { kind } => Some(LogRecord::new(
                format!("Input requested: {kind}"),
                LogLevel::Info,
            )),
            Self::AuthSuccess => Some(LogRecord::new("Signed in successfully", LogLevel::Success)),
            Self::AuthFailure { reason } => Some(LogRecord::new(
                format!("Authentication failed: {reason}"),
                LogLevel::Error,
            )),
            Self::ByteProgress { .. } => None,
            Self::Completed {
                exit_code,
                stopped_by_user,
            } => {
                let record = match (exit_code, stopped_by_user) {
                    (_, true) => LogRecord::new("Worker stopped by user", LogLevel::Warning),
                    (Some(0), false) => {
                        LogRecord::new("Worker completed successfully", LogLevel::Success)
                    }
                    (Some(code), false) => LogRecord::new(
                        format!("Worker failed with exit code: {code}"),
                        LogLevel::Error,
                    ),
                    (None, false) => {
                        LogRecord::new("Worker terminated by signal", LogLevel::Error)
                    }
                };
                Some(record)
            }
        }
    }
}
