//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use scrape_supervisor::process::{EventSink, WorkerCommand, WorkerProgram};
use scrape_supervisor::protocol::{Event, InputKind};
use scrape_supervisor::session::{
    ControllerConfig, PromptHandler, PromptState, RunOutcome, SessionController,
};

/// Upper bound for anything a test waits on.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A `/bin/sh -c` command running `script`.
pub fn sh(script: &str) -> WorkerCommand {
    WorkerCommand::new("/bin/sh").arg("-c").arg(script)
}

/// A `/bin/sh -c` worker program. Run arguments arrive as `$1`, `$2`, ...
pub fn sh_program(script: &str) -> WorkerProgram {
    WorkerProgram::new("/bin/sh")
        .arg("-c")
        .arg(script)
        .arg("worker")
}

/// Controller config with a fast poll interval and short kill grace.
pub fn fast_config(scraper: WorkerProgram) -> ControllerConfig {
    let mut config = ControllerConfig::new(scraper);
    config.poll_interval = Duration::from_millis(20);
    config.terminate_timeout = Duration::from_secs(1);
    config
}

/// Read events until `Completed` arrives.
pub async fn collect_until_completed(sink: &mut EventSink) -> Vec<Event> {
    let collect = async {
        let mut events = Vec::new();
        loop {
            let batch = sink.next_batch(Duration::from_millis(50)).await;
            let done = batch.iter().any(Event::is_terminal);
            events.extend(batch);
            if done || sink.is_closed() {
                return events;
            }
        }
    };
    tokio::time::timeout(TEST_TIMEOUT, collect)
        .await
        .expect("worker did not complete in time")
}

/// Drive a controller until its runs settle, returning every event seen.
pub async fn settle(controller: &mut SessionController) -> (Option<RunOutcome>, Vec<Event>) {
    let mut events = Vec::new();
    let outcome = tokio::time::timeout(
        TEST_TIMEOUT,
        controller.run_until_settled(|event| events.push(event.clone())),
    )
    .await
    .expect("controller did not settle in time");
    (outcome, events)
}

/// Plain worker output lines from a list of events.
pub fn plain_lines(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::PlainLine { text } => Some(text.clone()),
            _ => None,
        })
        .collect()
}

/// Prompt handler answering from a script and recording what it was asked.
#[derive(Clone, Default)]
pub struct ScriptedPrompter {
    answers: Arc<Mutex<VecDeque<Option<String>>>>,
    asked: Arc<Mutex<Vec<InputKind>>>,
}

impl ScriptedPrompter {
    pub fn new(answers: impl IntoIterator<Item = Option<&'static str>>) -> Self {
        Self {
            answers: Arc::new(Mutex::new(
                answers
                    .into_iter()
                    .map(|a| a.map(String::from))
                    .collect(),
            )),
            asked: Arc::default(),
        }
    }

    pub fn asked(&self) -> Vec<InputKind> {
        self.asked.lock().unwrap().clone()
    }
}

#[async_trait]
impl PromptHandler for ScriptedPrompter {
    async fn collect(&self, kind: &InputKind) -> Option<String> {
        self.asked.lock().unwrap().push(kind.clone());
        self.answers.lock().unwrap().pop_front().flatten()
    }
}

/// Prompt handler that never answers, like a user who walked away.
#[derive(Clone, Copy, Default)]
pub struct SilentPrompter;

#[async_trait]
impl PromptHandler for SilentPrompter {
    async fn collect(&self, _kind: &InputKind) -> Option<String> {
        std::future::pending().await
    }
}

/// Poll until the controller shows an outstanding prompt, returning the
/// events seen on the way.
pub async fn poll_until_prompt(controller: &mut SessionController) -> Vec<Event> {
    let wait = async {
        let mut events = Vec::new();
        loop {
            events.extend(controller.poll().await);
            if matches!(controller.bridge().state(), PromptState::PromptPending(_)) {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(TEST_TIMEOUT, wait)
        .await
        .expect("no prompt became pending in time")
}
