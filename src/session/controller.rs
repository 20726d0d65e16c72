//! Session controller: one supervised run at a time.
//!
//! The controller owns all per-run state and wires a [`ProcessSupervisor`]
//! to its [`EventSink`] for each run. All of it is driven from the consumer
//! side through [`SessionController::poll`]; the reader task never touches
//! controller state.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::process::{
    EventSink, ProcessSupervisor, SpawnError, WorkerCommand, WorkerProgram,
    DEFAULT_POLL_INTERVAL, DEFAULT_TERMINATE_TIMEOUT,
};
use crate::protocol::{Event, LogLevel};
use crate::session::{
    format_elapsed, format_size, transcription_command, update_command, InteractiveAuthBridge,
    ProgressAccumulator, ProgressSnapshot, PromptHandler, PromptResponse, RunState,
    RunStateMachine, RunStats, ScrapeRequest, ValidationError,
};

/// Error type for controller operations.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    /// The request failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Another run is in progress.
    #[error("A run is already in progress ({0})")]
    AlreadyRunning(RunState),
    /// The worker could not be launched.
    #[error("Failed to launch worker: {0}")]
    Spawn(#[from] SpawnError),
    /// No worker program is configured for this kind of run.
    #[error("No {0} worker configured")]
    NotConfigured(RunKind),
}

/// Which worker a run drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunKind {
    Scrape,
    Transcribe,
    Update,
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Scrape => "scraper",
            Self::Transcribe => "transcription",
            Self::Update => "update",
        };
        f.write_str(name)
    }
}

/// Unique identifier of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(Uuid);

impl RunId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Final record of a settled run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub run_id: RunId,
    pub kind: RunKind,
    /// Terminal state the run ended in.
    pub state: RunState,
    pub exit_code: Option<i32>,
    pub progress: ProgressSnapshot,
    /// Wall time from launch to settling.
    pub duration: Duration,
}

impl RunOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.state == RunState::Completed
    }
}

/// Worker programs and timing for a controller.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub scraper: WorkerProgram,
    pub transcriber: Option<WorkerProgram>,
    pub updater: Option<WorkerProgram>,
    /// Interval between drains in [`SessionController::run_until_settled`].
    pub poll_interval: Duration,
    /// Grace period between SIGTERM and SIGKILL.
    pub terminate_timeout: Duration,
}

impl ControllerConfig {
    #[must_use]
    pub fn new(scraper: WorkerProgram) -> Self {
        Self {
            scraper,
            transcriber: None,
            updater: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            terminate_timeout: DEFAULT_TERMINATE_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_transcriber(mut self, program: WorkerProgram) -> Self {
        self.transcriber = Some(program);
        self
    }

    #[must_use]
    pub fn with_updater(mut self, program: WorkerProgram) -> Self {
        self.updater = Some(program);
        self
    }
}

struct ActiveRun {
    id: RunId,
    kind: RunKind,
    supervisor: ProcessSupervisor,
    sink: EventSink,
    started_at: Instant,
    /// Folder to transcribe once this run succeeds.
    follow_up: Option<PathBuf>,
    auth_failure: Option<String>,
}

/// Top-level state machine owning at most one run.
pub struct SessionController {
    config: ControllerConfig,
    state: RunStateMachine,
    run: Option<ActiveRun>,
    progress: ProgressAccumulator,
    bridge: InteractiveAuthBridge,
    prompter: Arc<dyn PromptHandler>,
    /// Events produced on the consumer side, returned by the next `poll`.
    pending: Vec<Event>,
    history: Vec<RunOutcome>,
}

impl SessionController {
    #[must_use]
    pub fn new(config: ControllerConfig, prompter: impl PromptHandler + 'static) -> Self {
        Self {
            config,
            state: RunStateMachine::new(),
            run: None,
            progress: ProgressAccumulator::new(),
            bridge: InteractiveAuthBridge::new(),
            prompter: Arc::new(prompter),
            pending: Vec::new(),
            history: Vec::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> &RunState {
        self.state.state()
    }

    #[must_use]
    pub fn stats(&self) -> RunStats {
        self.state.stats()
    }

    #[must_use]
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Download totals of the current or most recent run.
    #[must_use]
    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    #[must_use]
    pub fn bridge(&self) -> &InteractiveAuthBridge {
        &self.bridge
    }

    /// Returns true while a worker process is owned by this controller.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.run.is_some()
    }

    /// Kind of the run in progress.
    #[must_use]
    pub fn current_kind(&self) -> Option<RunKind> {
        self.run.as_ref().map(|run| run.kind)
    }

    /// Process id of the worker in progress.
    #[must_use]
    pub fn active_pid(&self) -> Option<u32> {
        self.run.as_ref().and_then(|run| run.supervisor.id())
    }

    #[must_use]
    pub fn last_outcome(&self) -> Option<&RunOutcome> {
        self.history.last()
    }

    /// Outcomes of every settled run, oldest first.
    #[must_use]
    pub fn history(&self) -> &[RunOutcome] {
        &self.history
    }

    /// Start a scrape run.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyRunning` if a run is in progress,
    /// `SessionError::Validation` if a selection list is empty, and
    /// `SessionError::Spawn` if the worker cannot be launched.
    pub fn start(&mut self, request: &ScrapeRequest) -> Result<RunId, SessionError> {
        self.ensure_idle()?;
        request.validate()?;

        self.pending.push(Event::log(
            format!(
                "Starting scrape: {} groups, {} dates, data types {}, target {}",
                request.groups.len(),
                request.dates.len(),
                request
                    .data_types
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
                request.target_folder.display()
            ),
            LogLevel::Info,
        ));

        let command = request.to_command(&self.config.scraper);
        let follow_up = request
            .transcribe_after
            .then(|| request.target_folder.clone());
        self.launch(RunKind::Scrape, &command, follow_up)
    }

    /// Start a standalone transcription run over `folder`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotConfigured` without a transcriber, otherwise
    /// as for [`SessionController::start`].
    pub fn start_transcription(&mut self, folder: &Path) -> Result<RunId, SessionError> {
        self.ensure_idle()?;
        let program = self
            .config
            .transcriber
            .as_ref()
            .ok_or(SessionError::NotConfigured(RunKind::Transcribe))?;
        let command = transcription_command(program, folder);
        self.launch(RunKind::Transcribe, &command, None)
    }

    /// Start a repository update run for `repo`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotConfigured` without an updater, otherwise
    /// as for [`SessionController::start`].
    pub fn start_update(&mut self, repo: &Path) -> Result<RunId, SessionError> {
        self.ensure_idle()?;
        let program = self
            .config
            .updater
            .as_ref()
            .ok_or(SessionError::NotConfigured(RunKind::Update))?;
        let command = update_command(program, repo);
        self.launch(RunKind::Update, &command, None)
    }

    /// Request termination of the run in progress.
    ///
    /// Returns true if this call requested termination. Calling it again, or
    /// with no run in progress, has no effect.
    pub fn stop(&mut self) -> bool {
        if !matches!(self.state(), RunState::Starting | RunState::Running) {
            return false;
        }
        if let Some(run) = self.run.as_mut() {
            run.follow_up = None;
            run.supervisor.terminate();
            tracing::info!(run_id = %run.id, kind = %run.kind, "Stop requested");
        }
        self.bridge.clear();
        self.pending
            .push(Event::log("Stopped by user", LogLevel::Warning));
        self.state.transition(RunState::StoppingRequested)
    }

    /// Reset a terminal state to `Idle`. Returns true if the state changed.
    pub fn settle(&mut self) -> bool {
        self.state.settle()
    }

    /// Drain queued events without waiting and act on them.
    ///
    /// Byte progress updates the totals, input requests are handed to the
    /// prompt handler on its own task, answers that have come in are written
    /// to the worker, and the terminal event settles the run (starting the
    /// follow-up run if one was requested). Never waits for the user. Returns
    /// the events in order, interleaved with the controller's own log events.
    pub async fn poll(&mut self) -> Vec<Event> {
        let mut out = std::mem::take(&mut self.pending);
        let Some(run) = self.run.as_mut() else {
            return out;
        };
        let batch = run.sink.drain();
        let sink_closed = run.sink.is_closed();
        let mut completed = false;

        for event in batch {
            match &event {
                Event::ByteProgress { n } => self.progress.record(*n),
                Event::AuthFailure { reason } => {
                    if let Some(run) = self.run.as_mut() {
                        run.auth_failure = Some(reason.clone());
                    }
                }
                Event::InputRequest { kind } => {
                    let kind = kind.clone();
                    out.push(event);
                    self.bridge.request(kind);
                    if let Some(run) = self.run.as_mut() {
                        let logs = self.bridge.advance(&self.prompter, &mut run.supervisor).await;
                        out.extend(logs);
                    }
                    continue;
                }
                Event::Completed {
                    exit_code,
                    stopped_by_user,
                } => {
                    let (exit_code, stopped_by_user) = (*exit_code, *stopped_by_user);
                    out.push(event);
                    self.finish(exit_code, stopped_by_user, &mut out).await;
                    completed = true;
                    continue;
                }
                _ => {}
            }
            out.push(event);
        }

        if !completed && self.bridge.is_collecting() {
            if let Some(run) = self.run.as_mut() {
                let logs = self.bridge.advance(&self.prompter, &mut run.supervisor).await;
                out.extend(logs);
            }
        }

        if !completed && sink_closed {
            // The reader ended without reporting an exit status.
            let stopped = self
                .run
                .as_ref()
                .is_some_and(|run| run.supervisor.termination_requested());
            self.finish(None, stopped, &mut out).await;
        }

        out.append(&mut self.pending);
        out
    }

    /// Answer the outstanding prompt directly, abandoning the prompt handler.
    ///
    /// Returns `None` if no run is in progress or no prompt is outstanding.
    /// Queued prompts are handed to the prompt handler on the next `poll`.
    pub async fn respond(&mut self, value: &str) -> Option<PromptResponse> {
        let run = self.run.as_mut()?;
        let response = self.bridge.respond(&mut run.supervisor, value).await?;
        self.pending.push(response.to_event());
        Some(response)
    }

    /// Poll on the configured interval until no run is left, forwarding every
    /// event to `on_event`. Returns the outcome of the last run.
    pub async fn run_until_settled<F>(&mut self, mut on_event: F) -> Option<RunOutcome>
    where
        F: FnMut(&Event),
    {
        loop {
            for event in self.poll().await {
                on_event(&event);
            }
            if self.run.is_none() {
                return self.last_outcome().cloned();
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    fn ensure_idle(&self) -> Result<(), SessionError> {
        if self.state().is_active() {
            return Err(SessionError::AlreadyRunning(self.state().clone()));
        }
        Ok(())
    }

    fn launch(
        &mut self,
        kind: RunKind,
        command: &WorkerCommand,
        follow_up: Option<PathBuf>,
    ) -> Result<RunId, SessionError> {
        self.state.settle();
        self.progress.reset();
        self.bridge.clear();
        self.state.transition(RunState::Starting);

        let id = RunId::new();
        let (sender, sink) = EventSink::channel();

        match ProcessSupervisor::start_with_timeout(command, sender, self.config.terminate_timeout)
        {
            Ok(supervisor) => {
                tracing::info!(run_id = %id, %kind, pid = ?supervisor.id(), "Run started");
                self.state.transition(RunState::Running);
                self.run = Some(ActiveRun {
                    id,
                    kind,
                    supervisor,
                    sink,
                    started_at: Instant::now(),
                    follow_up,
                    auth_failure: None,
                });
                Ok(id)
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::error!(run_id = %id, %kind, error = %reason, "Failed to launch worker");
                self.state.transition(RunState::Failed(reason.clone()));
                self.pending.push(Event::log(
                    format!("Failed to launch {kind} worker: {reason}"),
                    LogLevel::Error,
                ));
                self.history.push(RunOutcome {
                    run_id: id,
                    kind,
                    state: RunState::Failed(reason),
                    exit_code: None,
                    progress: self.progress.snapshot(),
                    duration: Duration::ZERO,
                });
                Err(e.into())
            }
        }
    }

    async fn finish(&mut self, exit_code: Option<i32>, stopped_by_user: bool, out: &mut Vec<Event>) {
        let Some(mut run) = self.run.take() else {
            return;
        };
        if let Err(e) = run.supervisor.wait().await {
            tracing::warn!(run_id = %run.id, error = %e, "Reader task did not finish cleanly");
        }
        self.bridge.clear();

        let stopped_by_user =
            stopped_by_user || *self.state() == RunState::StoppingRequested;
        let state = if stopped_by_user {
            RunState::Stopped(exit_code)
        } else {
            match (exit_code, &run.auth_failure) {
                (Some(0), _) => RunState::Completed,
                (Some(_), Some(reason)) => {
                    RunState::Failed(format!("authentication failed: {reason}"))
                }
                (Some(code), None) => RunState::Failed(format!("worker exited with code {code}")),
                (None, _) => RunState::Failed("worker terminated by signal".to_string()),
            }
        };
        self.state.transition(state.clone());

        let progress = self.progress.snapshot();
        let duration = run.started_at.elapsed();
        tracing::info!(
            run_id = %run.id,
            kind = %run.kind,
            exit_code = ?exit_code,
            state = %state,
            files = progress.files_count,
            bytes = progress.bytes_total,
            duration_secs = duration.as_secs(),
            "Run settled"
        );
        if run.kind == RunKind::Scrape {
            if state == RunState::Completed {
                out.push(Event::log(
                    format!("Scraping completed in {}", format_elapsed(duration)),
                    LogLevel::Success,
                ));
            }
            out.push(Event::log(
                format!(
                    "Files downloaded: {} | Total size: {}",
                    progress.files_count,
                    format_size(progress.bytes_total)
                ),
                LogLevel::Info,
            ));
        }

        self.history.push(RunOutcome {
            run_id: run.id,
            kind: run.kind,
            state: state.clone(),
            exit_code,
            progress,
            duration,
        });

        if state == RunState::Completed {
            if let Some(folder) = run.follow_up.take() {
                self.start_follow_up(&folder, out);
            }
        }
    }

    fn start_follow_up(&mut self, folder: &Path, out: &mut Vec<Event>) {
        if self.config.transcriber.is_none() {
            tracing::warn!("Transcription requested but no transcriber is configured");
            out.push(Event::log(
                "Transcription requested but no transcriber is configured",
                LogLevel::Warning,
            ));
            return;
        }
        out.push(Event::log(
            format!("Starting transcription of {}", folder.display()),
            LogLevel::Success,
        ));
        // Launch failures are recorded in the history and pending log.
        let _ = self.start_transcription(folder);
    }
}

impl fmt::Debug for SessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("state", self.state())
            .field("kind", &self.current_kind())
            .field("pid", &self.active_pid())
            .field("runs", &self.history.len())
            .finish_non_exhaustive()
    }
}
