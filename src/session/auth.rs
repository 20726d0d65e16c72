//! Interactive credential relay between a worker and the user.
//!
//! A worker that prints `GUI_NEEDS_INPUT:<KIND>` blocks until it reads one
//! line. The bridge tracks the outstanding request, asks a
//! [`PromptHandler`] for the value on a separate task and always writes
//! exactly one line back, empty when the user cancels, so the worker never
//! stalls. Nothing here waits on the user: [`InteractiveAuthBridge::advance`]
//! only picks up answers that are already in.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::process::WorkerInput;
use crate::protocol::{Event, InputKind, LogLevel};

/// Presentation-side collaborator that collects a secret from the user.
#[async_trait]
pub trait PromptHandler: Send + Sync {
    /// Ask for a value of the given kind. `None` means the user cancelled.
    async fn collect(&self, kind: &InputKind) -> Option<String>;
}

/// The request currently shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPrompt {
    pub kind: InputKind,
    pub delivered_at: Instant,
}

/// Observable bridge state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptState {
    NoPrompt,
    PromptPending(InputKind),
}

/// How an outstanding prompt was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptResolution {
    /// A non-empty value was written.
    Delivered(InputKind),
    /// An empty line was written.
    Cancelled(InputKind),
}

impl PromptResolution {
    #[must_use]
    pub fn kind(&self) -> &InputKind {
        match self {
            Self::Delivered(kind) | Self::Cancelled(kind) => kind,
        }
    }
}

/// Result of [`InteractiveAuthBridge::respond`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptResponse {
    pub resolution: PromptResolution,
    /// False if the line could not be written to the worker.
    pub written: bool,
}

impl PromptResponse {
    /// Log event describing this round trip. Never contains the value.
    #[must_use]
    pub fn to_event(&self) -> Event {
        if !self.written {
            return Event::log("Failed to send input, worker not running", LogLevel::Error);
        }
        match &self.resolution {
            PromptResolution::Delivered(kind) => {
                Event::log(format!("{kind} submitted"), LogLevel::Success)
            }
            PromptResolution::Cancelled(kind) => {
                Event::log(format!("{kind} input cancelled or empty"), LogLevel::Warning)
            }
        }
    }
}

/// Pairs input requests with exactly one reply line each.
///
/// A request that arrives while another is outstanding is queued and
/// becomes outstanding once the earlier one is resolved.
#[derive(Debug, Default)]
pub struct InteractiveAuthBridge {
    pending: Option<PendingPrompt>,
    queued: VecDeque<InputKind>,
    last_resolution: Option<PromptResolution>,
    /// Handler task collecting the value for `pending`.
    collecting: Option<JoinHandle<Option<String>>>,
}

impl InteractiveAuthBridge {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> PromptState {
        match &self.pending {
            Some(prompt) => PromptState::PromptPending(prompt.kind.clone()),
            None => PromptState::NoPrompt,
        }
    }

    #[must_use]
    pub fn pending(&self) -> Option<&PendingPrompt> {
        self.pending.as_ref()
    }

    /// Number of requests waiting behind the outstanding one.
    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.queued.len()
    }

    #[must_use]
    pub fn last_resolution(&self) -> Option<&PromptResolution> {
        self.last_resolution.as_ref()
    }

    /// Returns true while a handler is collecting the outstanding value.
    #[must_use]
    pub fn is_collecting(&self) -> bool {
        self.collecting.is_some()
    }

    /// Register an input request. Returns true if it became the outstanding
    /// prompt, false if it was queued.
    pub fn request(&mut self, kind: InputKind) -> bool {
        if self.pending.is_some() {
            tracing::debug!(%kind, queued = self.queued.len() + 1, "Queueing input request");
            self.queued.push_back(kind);
            return false;
        }
        tracing::debug!(%kind, "Input request pending");
        self.pending = Some(PendingPrompt {
            kind,
            delivered_at: Instant::now(),
        });
        true
    }

    /// Resolve the outstanding prompt by writing one line to the worker.
    ///
    /// A blank `value` counts as a cancellation and writes an empty line.
    /// A handler still collecting for this prompt is abandoned. Returns
    /// `None` without writing if no prompt is outstanding.
    pub async fn respond<W>(&mut self, input: &mut W, value: &str) -> Option<PromptResponse>
    where
        W: WorkerInput + ?Sized,
    {
        let Some(prompt) = self.pending.take() else {
            tracing::warn!("Ignoring response with no outstanding prompt");
            return None;
        };
        if let Some(task) = self.collecting.take() {
            task.abort();
        }

        let value = value.trim();
        let (line, resolution) = if value.is_empty() {
            ("", PromptResolution::Cancelled(prompt.kind))
        } else {
            (value, PromptResolution::Delivered(prompt.kind))
        };

        let written = input.write_line(line).await;
        tracing::info!(
            kind = %resolution.kind(),
            delivered = matches!(resolution, PromptResolution::Delivered(_)),
            written,
            "Prompt resolved"
        );

        self.pending = self.queued.pop_front().map(|kind| PendingPrompt {
            kind,
            delivered_at: Instant::now(),
        });
        self.last_resolution = Some(resolution.clone());

        Some(PromptResponse {
            resolution,
            written,
        })
    }

    /// Move the outstanding prompt along without waiting for the user.
    ///
    /// Starts a `handler` task for a prompt that has none, writes the answer
    /// of a task that has finished, and answers unknown kinds with an empty
    /// line without consulting the handler. Returns log events describing
    /// each completed round trip.
    pub async fn advance<W>(
        &mut self,
        handler: &Arc<dyn PromptHandler>,
        input: &mut W,
    ) -> Vec<Event>
    where
        W: WorkerInput + ?Sized,
    {
        let mut events = Vec::new();

        while let Some(prompt) = self.pending.as_ref() {
            let kind = prompt.kind.clone();
            let value = if kind.is_known() {
                match self.collecting.take() {
                    None => {
                        let handler = Arc::clone(handler);
                        self.collecting =
                            Some(tokio::spawn(async move { handler.collect(&kind).await }));
                        break;
                    }
                    Some(task) if !task.is_finished() => {
                        self.collecting = Some(task);
                        break;
                    }
                    Some(task) => match task.await {
                        Ok(value) => value.unwrap_or_default(),
                        Err(e) => {
                            tracing::warn!(%kind, error = %e, "Prompt handler failed");
                            String::new()
                        }
                    },
                }
            } else {
                tracing::warn!(%kind, "Unrecognized input request, sending empty line");
                events.push(Event::log(
                    format!("Unrecognized input request: {kind}"),
                    LogLevel::Warning,
                ));
                String::new()
            };

            let Some(response) = self.respond(input, &value).await else {
                break;
            };
            events.push(response.to_event());
        }

        events
    }

    /// Drop any outstanding and queued prompts and abandon the handler.
    pub fn clear(&mut self) {
        if self.pending.is_some() || !self.queued.is_empty() {
            tracing::debug!(queued = self.queued.len(), "Discarding unanswered prompts");
        }
        self.pending = None;
        self.queued.clear();
        if let Some(task) = self.collecting.take() {
            task.abort();
        }
    }
}

impl Drop for InteractiveAuthBridge {
    fn drop(&mut self) {
        if let Some(task) = self.collecting.take() {
            task.abort();
        }
    }
}

/// Prompt handler that cancels every request.
///
/// For unattended runs where the worker is expected to already be signed in.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclinePrompts;

#[async_trait]
impl PromptHandler for DeclinePrompts {
    async fn collect(&self, kind: &InputKind) -> Option<String> {
        tracing::warn!(%kind, "Declining input request in unattended mode");
        None
    }
}
