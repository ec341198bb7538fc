//! Worker-side commands. Each run prints exactly one sentinel line on
//! stdout (or none, when the artifact could not be delivered).

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use lessonhost_core::worker::{self, PublishOutcome, Publisher, WorkerRunner};
use lessonhost_core::{LessonRegistry, ResultArtifact};

use crate::config::LessonhostConfig;

/// Run `lesson` with `message`. Returns whether a result was announced.
pub async fn run_execute(config: &LessonhostConfig, message: &str, lesson: &str) -> Result<bool> {
    let registry = Arc::new(LessonRegistry::builtin()?);
    let runner = WorkerRunner::new(registry).with_timeout(config.lesson_timeout);

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        cancel_clone.cancel();
    });

    let artifact = runner.run(lesson, message, &cancel).await;
    Ok(publish(config, &artifact))
}

/// Echo `message` back as a successful artifact.
pub fn run_display(config: &LessonhostConfig, message: &str) -> Result<bool> {
    Ok(publish(config, &worker::display(message)))
}

fn publish(config: &LessonhostConfig, artifact: &ResultArtifact) -> bool {
    let mut stdout = std::io::stdout().lock();
    let outcome = Publisher::new(&config.result_dir).publish(artifact, &mut stdout);
    if let Err(e) = stdout.flush() {
        tracing::warn!(error = %e, "failed to flush stdout");
    }
    if let PublishOutcome::Dropped { reason } = &outcome {
        eprintln!("result could not be delivered: {reason}");
    }
    outcome.announced()
}
