//! Line classifier for the worker control protocol.

use crate::protocol::{Event, InputKind};

/// Prefix of a credential request.
pub const NEEDS_INPUT_PREFIX: &str = "GUI_NEEDS_INPUT:";
/// Exact sentinel for a successful sign-in.
pub const AUTH_SUCCESS: &str = "GUI_AUTH_SUCCESS";
/// Prefix of a failed sign-in; the remainder is the reason.
pub const AUTH_FAILED_PREFIX: &str = "GUI_AUTH_FAILED:";
/// Prefix of a finished download; the remainder is a byte count.
pub const BYTES_DOWNLOADED_PREFIX: &str = "BYTES_DOWNLOADED:";

/// Classify one line of worker output.
///
/// Returns `None` for blank lines and for `BYTES_DOWNLOADED:` lines whose
/// value is not a decimal integer. Every other line yields exactly one event.
/// Matching is case-sensitive and anchored at the first character.
#[must_use]
pub fn classify_line(line: &str) -> Option<Event> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return None;
    }

    if let Some(kind) = line.strip_prefix(NEEDS_INPUT_PREFIX) {
        return Some(Event::InputRequest {
            kind: InputKind::parse(kind.trim_end()),
        });
    }

    if line == AUTH_SUCCESS {
        return Some(Event::AuthSuccess);
    }

    if let Some(reason) = line.strip_prefix(AUTH_FAILED_PREFIX) {
        return Some(Event::AuthFailure {
            reason: reason.to_string(),
        });
    }

    if let Some(value) = line.strip_prefix(BYTES_DOWNLOADED_PREFIX) {
        return match value.trim().parse::<u64>() {
            Ok(n) => Some(Event::ByteProgress { n }),
            Err(err) => {
                tracing::trace!(value, error = %err, "Dropping malformed byte count");
                None
            }
        };
    }

    Some(Event::PlainLine {
        text: line.to_string(),
    })
}
