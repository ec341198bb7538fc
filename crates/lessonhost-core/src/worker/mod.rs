//! Worker-side runner: resolve a lesson, run it inside a bounded scope, and
//! turn whatever happens into a [`ResultArtifact`].

pub mod publish;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::artifact::ResultArtifact;
use crate::lesson::LessonRegistry;

pub use publish::{PublishOutcome, Publisher};

/// Default wall-clock limit for a single lesson run.
pub const DEFAULT_LESSON_TIMEOUT: Duration = Duration::from_secs(300);

/// Runs lessons from a registry. Never panics or errors: every outcome is
/// an artifact.
#[derive(Debug, Clone)]
pub struct WorkerRunner {
    registry: Arc<LessonRegistry>,
    timeout: Duration,
}

impl WorkerRunner {
    pub fn new(registry: Arc<LessonRegistry>) -> Self {
        Self {
            registry,
            timeout: DEFAULT_LESSON_TIMEOUT,
        }
    }

    /// Override the per-run time limit.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the lesson named `lesson_name` with `input`.
    ///
    /// Unknown lessons, lesson errors, panics, timeouts and cancellation all
    /// produce a `success = false` artifact carrying the error text.
    pub async fn run(
        &self,
        lesson_name: &str,
        input: &str,
        cancel: &CancellationToken,
    ) -> ResultArtifact {
        let Some(lesson) = self.registry.lookup(lesson_name) else {
            tracing::error!(lesson = lesson_name, "lesson not found");
            return ResultArtifact::failure(
                Some(input.to_string()),
                format!("lesson not found: {lesson_name}"),
                Some(lesson_name.to_string()),
            );
        };

        let descriptor = lesson.descriptor();
        let lesson_id = Some(descriptor.id.clone());
        tracing::info!(
            lesson_id = %descriptor.id,
            display_name = %descriptor.display_name,
            "starting lesson"
        );

        let guarded = AssertUnwindSafe(lesson.run(input)).catch_unwind();
        let outcome = tokio::select! {
            () = cancel.cancelled() => Err("lesson run was cancelled".to_string()),
            timed = tokio::time::timeout(self.timeout, guarded) => match timed {
                Err(_elapsed) => Err(format!(
                    "lesson timed out after {}s",
                    self.timeout.as_secs_f64()
                )),
                Ok(Err(panic)) => Err(format!("lesson panicked: {}", panic_message(&panic))),
                Ok(Ok(Err(e))) => Err(format!("{e:#}")),
                Ok(Ok(Ok(output))) => Ok(output),
            },
        };

        match outcome {
            Ok(output) => {
                tracing::info!(lesson_id = %descriptor.id, "lesson completed successfully");
                ResultArtifact::success(Some(input.to_string()), output, lesson_id)
            }
            Err(message) => {
                tracing::error!(lesson_id = %descriptor.id, error = %message, "lesson failed");
                ResultArtifact::failure(Some(input.to_string()), message, lesson_id)
            }
        }
    }
}

/// Result of the single-purpose `display` worker: the message is the output.
pub fn display(message: &str) -> ResultArtifact {
    ResultArtifact::success(Some(message.to_string()), message, None)
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
