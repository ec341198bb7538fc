//! One handoff from start to result: launch the worker, watch its output
//! for the sentinel, and read the artifact it names.

use std::pin::Pin;

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::artifact::ResultArtifact;
use crate::config::HandoffConfig;
use crate::flow::Invocation;
use crate::launcher::{WorkerHandle, WorkerLauncher, WorkerLine};
use crate::reader::{ArtifactReader, ReadOutcome};
use crate::sentinel::{OutputWatcher, SentinelMatch, match_line};

type LineStream = Pin<Box<dyn Stream<Item = WorkerLine> + Send>>;

/// How one handoff ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandoffOutcome {
    /// The worker could not be started.
    StartFailed(String),
    /// The worker's output ended without announcing a result.
    NoSentinel,
    /// An artifact was delivered (possibly synthesized from bad content).
    Result(ResultArtifact),
    /// A sentinel was seen but no artifact could be obtained.
    NoResult(String),
    /// The caller cancelled; the worker was stopped.
    Cancelled,
}

/// Run `invocation` through `launcher` and collect its result.
///
/// Never fails: every problem becomes a [`HandoffOutcome`] variant. After
/// the first sentinel, the rest of the worker's output is drained in the
/// background so the worker never blocks on a full pipe.
pub async fn run_handoff(
    launcher: &dyn WorkerLauncher,
    invocation: Invocation,
    config: &HandoffConfig,
    cancel: &CancellationToken,
) -> HandoffOutcome {
    tracing::info!(launcher = launcher.name(), args = %invocation, "starting worker");
    let handle = match launcher.start(&invocation).await {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "failed to start worker");
            return HandoffOutcome::StartFailed(format!("{e:#}"));
        }
    };

    let mut lines = launcher.lines(&handle);
    let mut watcher = OutputWatcher::new();

    let watched = tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        r = tokio::time::timeout(config.worker_deadline, watch_for_sentinel(&mut lines, &mut watcher)) => Some(r),
    };

    let found = match watched {
        None => {
            stop(launcher, &handle).await;
            return HandoffOutcome::Cancelled;
        }
        Some(Err(_elapsed)) => {
            tracing::warn!(
                pid = handle.pid,
                deadline_secs = config.worker_deadline.as_secs(),
                "worker did not announce a result in time"
            );
            stop(launcher, &handle).await;
            return HandoffOutcome::NoResult(format!(
                "worker did not announce a result within {}s",
                config.worker_deadline.as_secs()
            ));
        }
        Some(Ok(None)) => {
            tracing::warn!(pid = handle.pid, "worker output ended without a result sentinel");
            launcher.detach(&handle).await;
            return HandoffOutcome::NoSentinel;
        }
        Some(Ok(Some(found))) => found,
    };

    tokio::spawn(drain(lines, handle.pid));

    let outcome = match found {
        SentinelMatch::Inline(json) => {
            tracing::info!(pid = handle.pid, "result artifact received inline");
            HandoffOutcome::Result(ResultArtifact::parse_or_synthesize(&json))
        }
        SentinelMatch::File(path) => {
            tracing::info!(pid = handle.pid, path = %path.display(), "result sentinel detected");
            let reader = ArtifactReader::new(config.clone());
            match reader.read(&path, cancel).await {
                ReadOutcome::Done(artifact) => HandoffOutcome::Result(artifact),
                ReadOutcome::TimedOut => HandoffOutcome::NoResult(format!(
                    "result artifact {} did not appear within {}ms",
                    path.display(),
                    config.file_deadline.as_millis()
                )),
                ReadOutcome::ReadFailed(reason) => HandoffOutcome::NoResult(reason),
                ReadOutcome::Cancelled => {
                    stop(launcher, &handle).await;
                    HandoffOutcome::Cancelled
                }
            }
        }
    };
    // The worker may outlive the handoff; it is reaped once it exits.
    launcher.detach(&handle).await;
    outcome
}

/// Consume lines until the first sentinel. `None` if output ended first.
async fn watch_for_sentinel(
    lines: &mut LineStream,
    watcher: &mut OutputWatcher,
) -> Option<SentinelMatch> {
    while let Some(line) = lines.next().await {
        match line {
            WorkerLine::Stdout(text) => {
                tracing::info!(target: "lessonhost::worker", "{text}");
                if let Some(found) = watcher.observe(&text) {
                    return Some(found);
                }
            }
            WorkerLine::Error { message } => {
                tracing::warn!(error = %message, "worker output interrupted");
            }
            WorkerLine::Closed => break,
        }
    }
    None
}

async fn drain(mut lines: LineStream, pid: u32) {
    while let Some(line) = lines.next().await {
        if let WorkerLine::Stdout(text) = line {
            tracing::info!(target: "lessonhost::worker", "{text}");
            if match_line(&text).is_some() {
                tracing::debug!(pid, "ignoring repeated result sentinel");
            }
        }
    }
    tracing::debug!(pid, "worker output closed");
}

async fn stop(launcher: &dyn WorkerLauncher, handle: &WorkerHandle) {
    if let Err(e) = launcher.kill(handle).await {
        tracing::warn!(pid = handle.pid, error = %format!("{e:#}"), "failed to stop worker");
    }
}
