//! Interaction flow: the dialogue that turns a user's choices into a worker
//! [`Invocation`], and the mapping from a [`ResultArtifact`] back to what the
//! user is shown.

use std::fmt;

use crate::artifact::ResultArtifact;
use crate::interaction::{
    ChoiceOption, ChoicePrompt, Intent, InteractionService, MessageBox, Notice, Prompt, TextPrompt,
};
use crate::lesson::{ARGUMENT_SEPARATOR, LessonDescriptor, LessonRegistry};
use crate::session::HandoffOutcome;

/// Input sent for lessons that take none.
pub const NO_INPUT_NEEDED: &str = "No input needed";
/// Input substituted for a blank submission.
pub const DEFAULT_INPUT: &str = "Hello, World!";

const INPUT_PLACEHOLDER: &str = "Enter your message here";
const DEFAULT_INPUT_TITLE: &str = "Message Input";
const DEFAULT_INPUT_MESSAGE: &str = "Please enter your message:";
const DEFAULT_INFORMATIONAL_TITLE: &str = "Information";

const NO_OUTPUT_MESSAGE: &str = "The operation completed, but produced no output";
const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error occurred.";
const NO_RESULT_MESSAGE: &str = "The worker completed, but no result was captured.";

/// Failures that stop an interactive action before any worker starts.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("no lessons available")]
    NoLessons,

    #[error("unknown lesson: {0:?}")]
    UnknownLesson(String),

    #[error("interaction service not available")]
    InteractionUnavailable,

    #[error("interaction failed")]
    Interaction(#[source] anyhow::Error),
}

// ---------------------------------------------------------------------------
// Invocation
// ---------------------------------------------------------------------------

/// What the worker is asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    /// Run a lesson: `execute <message> <lesson display name>`.
    Execute,
    /// Echo a message: `display <message>`.
    Display,
}

impl Verb {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Execute => "execute",
            Self::Display => "display",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully built worker command line, handed to the launcher by value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub verb: Verb,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn execute(message: impl Into<String>, lesson: impl Into<String>) -> Self {
        Self {
            verb: Verb::Execute,
            args: vec![message.into(), lesson.into()],
        }
    }

    pub fn display(message: impl Into<String>) -> Self {
        Self {
            verb: Verb::Display,
            args: vec![message.into()],
        }
    }

    /// `[verb, ...args]`, as passed to the worker binary.
    pub fn to_args(&self) -> Vec<String> {
        std::iter::once(self.verb.as_str().to_string())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

impl fmt::Display for Invocation {
    /// Comma-joined, for logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = format!("{ARGUMENT_SEPARATOR} ");
        f.write_str(&self.to_args().join(&sep))
    }
}

/// Build the `execute` invocation for `descriptor`.
pub fn build_invocation(descriptor: &LessonDescriptor, input: &str) -> Invocation {
    Invocation::execute(input, descriptor.display_name.clone())
}

// ---------------------------------------------------------------------------
// Presentation
// ---------------------------------------------------------------------------

/// Which of the result screens is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentationKind {
    Completed,
    NoOutput,
    Error,
    /// The handoff produced nothing to show.
    NoResult,
}

/// What the user is shown once an invocation ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presentation {
    pub kind: PresentationKind,
    pub title: String,
    pub message: String,
    pub intent: Intent,
    pub markdown: bool,
}

impl Presentation {
    /// Map an artifact (or its absence) to a presentation.
    pub fn for_artifact(artifact: Option<&ResultArtifact>) -> Self {
        let prefix = artifact
            .and_then(|a| a.lesson_id.as_deref())
            .filter(|id| !id.trim().is_empty())
            .map(|id| format!("{id} "))
            .unwrap_or_default();

        match artifact {
            Some(a) if a.success => match a.trusted_output() {
                Some(output) => Self {
                    kind: PresentationKind::Completed,
                    title: format!("{prefix}Completed"),
                    message: output.to_string(),
                    intent: Intent::Success,
                    markdown: true,
                },
                None => Self {
                    kind: PresentationKind::NoOutput,
                    title: format!("{prefix}No Output"),
                    message: NO_OUTPUT_MESSAGE.to_string(),
                    intent: Intent::Warning,
                    markdown: false,
                },
            },
            _ => Self {
                kind: PresentationKind::Error,
                title: format!("{prefix}Error"),
                message: artifact
                    .and_then(|a| a.error_message.clone())
                    .unwrap_or_else(|| UNKNOWN_ERROR_MESSAGE.to_string()),
                intent: Intent::Error,
                markdown: false,
            },
        }
    }

    /// The neutral notice for a handoff that yielded no artifact.
    pub fn no_result() -> Self {
        Self {
            kind: PresentationKind::NoResult,
            title: "Completed".to_string(),
            message: NO_RESULT_MESSAGE.to_string(),
            intent: Intent::Information,
            markdown: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Flow
// ---------------------------------------------------------------------------

/// Runs the prompt sequence against an [`InteractionService`].
pub struct InteractionFlow<'a> {
    registry: &'a LessonRegistry,
    interaction: &'a dyn InteractionService,
}

impl<'a> InteractionFlow<'a> {
    pub fn new(registry: &'a LessonRegistry, interaction: &'a dyn InteractionService) -> Self {
        Self {
            registry,
            interaction,
        }
    }

    /// Ask the user which lesson to run.
    pub async fn prompt_lesson_choice(&self) -> Result<Prompt<LessonDescriptor>, FlowError> {
        let lessons = self.registry.discover();
        if lessons.is_empty() {
            return Err(FlowError::NoLessons);
        }

        let prompt = ChoicePrompt {
            title: "Lesson Selection".to_string(),
            message: "Please select a lesson:".to_string(),
            options: lessons
                .iter()
                .map(|d| ChoiceOption {
                    value: d.display_name.clone(),
                    label: d.choice_label(),
                })
                .collect(),
        };

        let answer = self
            .interaction
            .prompt_choice(&prompt)
            .await
            .map_err(FlowError::Interaction)?;
        let Prompt::Answered(name) = answer else {
            tracing::info!("lesson selection cancelled");
            return Ok(Prompt::Cancelled);
        };

        self.registry
            .descriptor(&name)
            .cloned()
            .map(Prompt::Answered)
            .ok_or(FlowError::UnknownLesson(name))
    }

    /// Collect the lesson's input, if it takes any.
    pub async fn prompt_input_if_needed(
        &self,
        descriptor: &LessonDescriptor,
    ) -> Result<Prompt<String>, FlowError> {
        if !descriptor.needs_input {
            return Ok(Prompt::Answered(NO_INPUT_NEEDED.to_string()));
        }

        if descriptor.has_informational_screen() {
            let info = MessageBox {
                title: non_blank(descriptor.informational_title.as_deref())
                    .unwrap_or(DEFAULT_INFORMATIONAL_TITLE)
                    .to_string(),
                message: descriptor.informational_message.clone().unwrap_or_default(),
                intent: Intent::Information,
                markdown: true,
                button: "Continue".to_string(),
            };
            if let Err(e) = self.interaction.message_box(&info).await {
                tracing::warn!(error = %format!("{e:#}"), "failed to show informational screen");
            }
        }

        let prompt = TextPrompt {
            title: "Provide Input".to_string(),
            message: non_blank(descriptor.input_prompt_message.as_deref())
                .unwrap_or(DEFAULT_INPUT_MESSAGE)
                .to_string(),
            label: non_blank(descriptor.input_prompt_title.as_deref())
                .unwrap_or(DEFAULT_INPUT_TITLE)
                .to_string(),
            placeholder: Some(INPUT_PLACEHOLDER.to_string()),
        };
        let answer = self
            .interaction
            .prompt_text(&prompt)
            .await
            .map_err(FlowError::Interaction)?;
        Ok(answer.map(or_default_input))
    }

    /// Full `execute` dialogue: choose a lesson, then collect its input.
    pub async fn configure_lesson_run(&self) -> Result<Prompt<Invocation>, FlowError> {
        self.ensure_available()?;

        let Prompt::Answered(descriptor) = self.prompt_lesson_choice().await? else {
            return Ok(Prompt::Cancelled);
        };
        let Prompt::Answered(input) = self.prompt_input_if_needed(&descriptor).await? else {
            tracing::info!(lesson = %descriptor.display_name, "lesson input cancelled");
            return Ok(Prompt::Cancelled);
        };

        let invocation = build_invocation(&descriptor, &input);
        tracing::info!(args = %invocation, "configured worker invocation");
        Ok(Prompt::Answered(invocation))
    }

    /// Single-shot `display` dialogue: one free-text prompt.
    pub async fn configure_display_run(&self) -> Result<Prompt<Invocation>, FlowError> {
        self.ensure_available()?;

        let prompt = TextPrompt {
            title: "User Input".to_string(),
            message: "Please enter some text:".to_string(),
            label: "UserInput".to_string(),
            placeholder: Some(INPUT_PLACEHOLDER.to_string()),
        };
        let answer = self
            .interaction
            .prompt_text(&prompt)
            .await
            .map_err(FlowError::Interaction)?;

        match answer {
            Prompt::Answered(text) => {
                let invocation = Invocation::display(or_default_input(text));
                tracing::info!(args = %invocation, "configured worker invocation");
                Ok(Prompt::Answered(invocation))
            }
            Prompt::Cancelled => {
                self.notify(&Notice {
                    title: "Cancelled".to_string(),
                    message: "Operation cancelled by user.".to_string(),
                    intent: Intent::Information,
                })
                .await;
                Ok(Prompt::Cancelled)
            }
        }
    }

    /// Show the outcome of a finished invocation. Never fails.
    pub async fn present_result(&self, artifact: Option<&ResultArtifact>) -> Presentation {
        let presentation = Presentation::for_artifact(artifact);
        self.present(&presentation).await;
        presentation
    }

    /// Show the neutral "no result" notice. Never fails.
    pub async fn present_no_result(&self, reason: &str) -> Presentation {
        tracing::info!(reason, "no result captured from worker");
        let presentation = Presentation::no_result();
        self.present(&presentation).await;
        presentation
    }

    /// Show whatever a finished handoff produced. Returns `None` when the
    /// handoff was cancelled and only a notice was sent.
    pub async fn present_outcome(&self, outcome: &HandoffOutcome) -> Option<Presentation> {
        match outcome {
            HandoffOutcome::Result(artifact) => Some(self.present_result(Some(artifact)).await),
            HandoffOutcome::StartFailed(reason) => {
                let artifact =
                    ResultArtifact::failure(None, format!("failed to start worker: {reason}"), None);
                Some(self.present_result(Some(&artifact)).await)
            }
            HandoffOutcome::NoSentinel => Some(
                self.present_no_result("worker output ended without a result sentinel")
                    .await,
            ),
            HandoffOutcome::NoResult(reason) => Some(self.present_no_result(reason).await),
            HandoffOutcome::Cancelled => {
                self.notify(&Notice {
                    title: "Cancelled".to_string(),
                    message: "The worker was stopped before it returned a result.".to_string(),
                    intent: Intent::Warning,
                })
                .await;
                None
            }
        }
    }

    async fn present(&self, presentation: &Presentation) {
        if !self.interaction.is_available() {
            tracing::info!(
                title = %presentation.title,
                "interaction service not available, skipping presentation"
            );
            return;
        }

        let shown = match presentation.kind {
            PresentationKind::NoResult => {
                self.interaction
                    .notify(&Notice {
                        title: presentation.title.clone(),
                        message: presentation.message.clone(),
                        intent: presentation.intent,
                    })
                    .await
            }
            _ => {
                self.interaction
                    .message_box(&MessageBox {
                        title: presentation.title.clone(),
                        message: presentation.message.clone(),
                        intent: presentation.intent,
                        markdown: presentation.markdown,
                        button: "OK".to_string(),
                    })
                    .await
            }
        };
        if let Err(e) = shown {
            tracing::warn!(title = %presentation.title, error = %format!("{e:#}"), "failed to present result");
        }
    }

    async fn notify(&self, notice: &Notice) {
        if !self.interaction.is_available() {
            return;
        }
        if let Err(e) = self.interaction.notify(notice).await {
            tracing::warn!(title = %notice.title, error = %format!("{e:#}"), "failed to send notice");
        }
    }

    fn ensure_available(&self) -> Result<(), FlowError> {
        if self.interaction.is_available() {
            Ok(())
        } else {
            Err(FlowError::InteractionUnavailable)
        }
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}

fn or_default_input(text: String) -> String {
    if text.trim().is_empty() {
        DEFAULT_INPUT.to_string()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lesson::GroupOrder;

    #[test]
    fn invocation_renders_verb_first() {
        let inv = Invocation::execute("hi", "Echo");
        assert_eq!(inv.to_args(), vec!["execute", "hi", "Echo"]);
        assert_eq!(inv.to_string(), "execute, hi, Echo");
        assert_eq!(Invocation::display("x").to_args(), vec!["display", "x"]);
    }

    #[test]
    fn build_invocation_uses_display_name() {
        let descriptor = LessonDescriptor::new("echo", "Echo", GroupOrder::new(1, 1));
        let inv = build_invocation(&descriptor, "hello");
        assert_eq!(inv.verb, Verb::Execute);
        assert_eq!(inv.args, vec!["hello", "Echo"]);
    }

    #[test]
    fn success_with_output_is_completed() {
        let artifact = ResultArtifact::success(Some("hi".into()), "Hello", None);
        let p = Presentation::for_artifact(Some(&artifact));
        assert_eq!(p.kind, PresentationKind::Completed);
        assert_eq!(p.title, "Completed");
        assert_eq!(p.message, "Hello");
        assert_eq!(p.intent, Intent::Success);
        assert!(p.markdown);
    }

    #[test]
    fn success_with_blank_output_is_no_output() {
        for output in ["", "   ", "\n\t"] {
            let artifact = ResultArtifact::success(None, output, None);
            let p = Presentation::for_artifact(Some(&artifact));
            assert_eq!(p.kind, PresentationKind::NoOutput);
            assert_eq!(p.message, NO_OUTPUT_MESSAGE);
            assert_eq!(p.intent, Intent::Warning);
        }
        let missing = ResultArtifact {
            success: true,
            ..Default::default()
        };
        assert_eq!(
            Presentation::for_artifact(Some(&missing)).kind,
            PresentationKind::NoOutput
        );
    }

    #[test]
    fn failure_is_error_even_with_output() {
        let artifact = ResultArtifact {
            success: false,
            output: Some("stale".into()),
            error_message: Some("boom".into()),
            ..Default::default()
        };
        let p = Presentation::for_artifact(Some(&artifact));
        assert_eq!(p.kind, PresentationKind::Error);
        assert_eq!(p.message, "boom");
        assert_eq!(p.intent, Intent::Error);
    }

    #[test]
    fn missing_artifact_or_message_uses_default_error() {
        let p = Presentation::for_artifact(None);
        assert_eq!(p.kind, PresentationKind::Error);
        assert_eq!(p.message, UNKNOWN_ERROR_MESSAGE);

        let bare = ResultArtifact::default();
        assert_eq!(
            Presentation::for_artifact(Some(&bare)).message,
            UNKNOWN_ERROR_MESSAGE
        );
    }

    #[test]
    fn titles_carry_lesson_id_prefix() {
        let artifact = ResultArtifact::success(None, "x", Some("echo".into()));
        assert_eq!(Presentation::for_artifact(Some(&artifact)).title, "echo Completed");

        let blank_id = ResultArtifact::failure(None, "e", Some("  ".into()));
        assert_eq!(Presentation::for_artifact(Some(&blank_id)).title, "Error");
    }

    #[test]
    fn no_result_is_neutral() {
        let p = Presentation::no_result();
        assert_eq!(p.kind, PresentationKind::NoResult);
        assert_eq!(p.intent, Intent::Information);
        assert_eq!(p.message, NO_RESULT_MESSAGE);
    }

    #[test]
    fn blank_input_falls_back_to_default() {
        assert_eq!(or_default_input("  ".into()), DEFAULT_INPUT);
        assert_eq!(or_default_input("keep".into()), "keep");
    }
}
