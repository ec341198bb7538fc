//! Shared test utilities for lessonhost integration tests.
//!
//! - [`ScriptedInteraction`]: an [`InteractionService`] that answers prompts
//!   from a script and records every call.
//! - [`sh_worker`]: a [`ProcessLauncher`] that runs a shell snippet as the
//!   worker.
//! - [`fast_handoff_config`]: handoff timings short enough for tests.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;

use lessonhost_core::HandoffConfig;
use lessonhost_core::interaction::{
    ChoicePrompt, InteractionService, MessageBox, Notice, Prompt, TextPrompt,
};
use lessonhost_core::launcher::ProcessLauncher;

// ---------------------------------------------------------------------------
// Scripted interaction service
// ---------------------------------------------------------------------------

/// One recorded call on a [`ScriptedInteraction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionCall {
    Choice(ChoicePrompt),
    Text(TextPrompt),
    MessageBox(MessageBox),
    Notice(Notice),
}

/// Interaction service driven by a queue of answers.
///
/// Prompts pop the next answer; an empty queue cancels. Every call is
/// recorded for assertions.
#[derive(Debug, Default)]
pub struct ScriptedInteraction {
    unavailable: bool,
    fail_display: bool,
    answers: Mutex<VecDeque<Prompt<String>>>,
    calls: Mutex<Vec<InteractionCall>>,
}

impl ScriptedInteraction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an answer for the next prompt.
    pub fn answer(self, value: impl Into<String>) -> Self {
        self.push(Prompt::Answered(value.into()))
    }

    /// Queue a cancellation for the next prompt.
    pub fn cancel(self) -> Self {
        self.push(Prompt::Cancelled)
    }

    /// Report the surface as unreachable.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Make every message box and notice return an error.
    pub fn failing_display(mut self) -> Self {
        self.fail_display = true;
        self
    }

    fn push(self, answer: Prompt<String>) -> Self {
        self.answers
            .lock()
            .expect("answers lock poisoned")
            .push_back(answer);
        self
    }

    /// Everything that has been shown or asked so far.
    pub fn calls(&self) -> Vec<InteractionCall> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }

    /// Only the message boxes shown so far.
    pub fn message_boxes(&self) -> Vec<MessageBox> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                InteractionCall::MessageBox(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    /// Only the notices sent so far.
    pub fn notices(&self) -> Vec<Notice> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                InteractionCall::Notice(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: InteractionCall) {
        self.calls.lock().expect("calls lock poisoned").push(call);
    }

    fn next_answer(&self) -> Prompt<String> {
        self.answers
            .lock()
            .expect("answers lock poisoned")
            .pop_front()
            .unwrap_or(Prompt::Cancelled)
    }
}

#[async_trait]
impl InteractionService for ScriptedInteraction {
    fn is_available(&self) -> bool {
        !self.unavailable
    }

    async fn prompt_choice(&self, prompt: &ChoicePrompt) -> Result<Prompt<String>> {
        self.record(InteractionCall::Choice(prompt.clone()));
        Ok(self.next_answer())
    }

    async fn prompt_text(&self, prompt: &TextPrompt) -> Result<Prompt<String>> {
        self.record(InteractionCall::Text(prompt.clone()));
        Ok(self.next_answer())
    }

    async fn message_box(&self, message: &MessageBox) -> Result<()> {
        self.record(InteractionCall::MessageBox(message.clone()));
        if self.fail_display {
            bail!("display surface went away");
        }
        Ok(())
    }

    async fn notify(&self, notice: &Notice) -> Result<()> {
        self.record(InteractionCall::Notice(notice.clone()));
        if self.fail_display {
            bail!("display surface went away");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fake workers
// ---------------------------------------------------------------------------

/// Write `body` to `dir/worker.sh` and return a launcher that runs it with
/// `/bin/sh`. The invocation arguments arrive as `$1`, `$2`, ...
pub fn sh_worker(dir: &Path, body: &str) -> ProcessLauncher {
    let script = dir.join("worker.sh");
    std::fs::write(&script, format!("#!/bin/sh\n{body}")).expect("failed to write worker script");
    ProcessLauncher::new("/bin/sh")
        .with_leading_args([script.to_string_lossy().into_owned()])
        .with_kill_grace(Duration::from_secs(2))
}

/// Handoff timings scaled down for tests.
pub fn fast_handoff_config() -> HandoffConfig {
    HandoffConfig {
        poll_interval: Duration::from_millis(10),
        file_deadline: Duration::from_secs(2),
        stabilization: Duration::from_millis(20),
        read_attempts: 5,
        read_backoff: Duration::from_millis(5),
        read_backoff_max: Duration::from_millis(20),
        worker_deadline: Duration::from_secs(10),
    }
}

/// The artifact JSON from the canonical "hello" scenario.
pub const HELLO_ARTIFACT_JSON: &str = r#"{"success":true,"output":"Hello","input":"hi"}"#;
