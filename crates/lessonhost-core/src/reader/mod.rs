//! Artifact reader: waits for the file a sentinel named, reads it while
//! tolerating a writer that has not let go yet, parses it, and deletes it.
//!
//! ```text
//! AwaitingFile -> StabilizationDelay -> Reading -> Parsing -> Done
//!      |                 |                 |
//!   TimedOut         Cancelled         ReadFailed
//! ```
//!
//! Every sleep and every file access races the caller's
//! [`CancellationToken`], so any state can end in `Cancelled`.

pub mod source;

use std::io;
use std::path::Path;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::artifact::ResultArtifact;
use crate::config::HandoffConfig;

pub use source::{ArtifactSource, FsArtifactSource};

/// Floor on the probe interval, so a zero setting cannot busy-wait.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// States the reader moves through for one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    AwaitingFile,
    StabilizationDelay,
    Reading,
    Parsing,
    Done,
    TimedOut,
    ReadFailed,
    Cancelled,
}

impl ReaderState {
    /// Whether the reader stops in this state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Done | Self::TimedOut | Self::ReadFailed | Self::Cancelled
        )
    }
}

/// Terminal result of reading one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The file was read. The artifact is either what the worker wrote or a
    /// synthesized failure describing why it could not be parsed.
    Done(ResultArtifact),
    /// The file never appeared (or stayed empty) before the deadline.
    TimedOut,
    /// The file could not be read.
    ReadFailed(String),
    /// The caller cancelled the read.
    Cancelled,
}

impl ReadOutcome {
    /// The terminal [`ReaderState`] this outcome corresponds to.
    pub fn state(&self) -> ReaderState {
        match self {
            Self::Done(_) => ReaderState::Done,
            Self::TimedOut => ReaderState::TimedOut,
            Self::ReadFailed(_) => ReaderState::ReadFailed,
            Self::Cancelled => ReaderState::Cancelled,
        }
    }
}

/// Whether `e` looks like another process still holding the file.
///
/// Covers `WouldBlock`, `PermissionDenied` and `Interrupted` everywhere, plus
/// `ERROR_SHARING_VIOLATION` (32) and `ERROR_LOCK_VIOLATION` (33) on Windows.
pub fn is_lock_error(e: &io::Error) -> bool {
    if matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::PermissionDenied | io::ErrorKind::Interrupted
    ) {
        return true;
    }
    cfg!(windows) && matches!(e.raw_os_error(), Some(32 | 33))
}

/// Reads result artifacts announced by the worker.
#[derive(Debug, Clone)]
pub struct ArtifactReader<S = FsArtifactSource> {
    source: S,
    config: HandoffConfig,
}

impl ArtifactReader<FsArtifactSource> {
    /// A reader over the real filesystem.
    pub fn new(config: HandoffConfig) -> Self {
        Self::with_source(FsArtifactSource, config)
    }
}

impl<S: ArtifactSource> ArtifactReader<S> {
    pub fn with_source(source: S, config: HandoffConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &HandoffConfig {
        &self.config
    }

    /// Drive the state machine for `path` to a terminal state.
    pub async fn read(&self, path: &Path, cancel: &CancellationToken) -> ReadOutcome {
        tracing::debug!(path = %path.display(), state = ?ReaderState::AwaitingFile, "waiting for result artifact");
        if let Some(outcome) = self.await_file(path, cancel).await {
            return outcome;
        }

        tracing::debug!(path = %path.display(), state = ?ReaderState::StabilizationDelay, "result artifact present");
        if !pause(self.config.stabilization, cancel).await {
            return ReadOutcome::Cancelled;
        }

        let bytes = match self.read_with_retry(path, cancel).await {
            Ok(bytes) => bytes,
            Err(outcome) => return outcome,
        };

        tracing::debug!(path = %path.display(), state = ?ReaderState::Parsing, bytes = bytes.len(), "parsing result artifact");
        let artifact = ResultArtifact::parse_or_synthesize(&String::from_utf8_lossy(&bytes));

        if let Err(e) = self.source.remove(path).await {
            tracing::warn!(path = %path.display(), error = %e, "failed to delete result artifact");
        }
        tracing::debug!(path = %path.display(), state = ?ReaderState::Done, success = artifact.success, "result artifact consumed");
        ReadOutcome::Done(artifact)
    }

    /// Poll until the file exists with nonzero size. Returns `Some` with a
    /// terminal outcome if the wait ended any other way.
    async fn await_file(&self, path: &Path, cancel: &CancellationToken) -> Option<ReadOutcome> {
        let deadline = Instant::now() + self.config.file_deadline;
        loop {
            if cancel.is_cancelled() {
                return Some(ReadOutcome::Cancelled);
            }
            let probed = tokio::select! {
                biased;
                () = cancel.cancelled() => return Some(ReadOutcome::Cancelled),
                r = self.source.probe(path) => r,
            };
            match probed {
                Ok(len) if len > 0 => return None,
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "probe failed; treating artifact as not yet present");
                }
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(
                    path = %path.display(),
                    deadline_ms = self.config.file_deadline.as_millis() as u64,
                    "result artifact did not appear in time"
                );
                return Some(ReadOutcome::TimedOut);
            }
            let nap = self
                .config
                .poll_interval
                .max(MIN_POLL_INTERVAL)
                .min(deadline - now);
            if !pause(nap, cancel).await {
                return Some(ReadOutcome::Cancelled);
            }
        }
    }

    async fn read_with_retry(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ReadOutcome> {
        let attempts = self.config.read_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            tracing::debug!(path = %path.display(), state = ?ReaderState::Reading, attempt, "reading result artifact");
            let read = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ReadOutcome::Cancelled),
                r = self.source.read(path) => r,
            };
            match read {
                Ok(bytes) => return Ok(bytes),
                Err(e) if is_lock_error(&e) && attempt < attempts => {
                    let wait = self.config.backoff_for(attempt - 1);
                    tracing::warn!(
                        path = %path.display(),
                        attempt,
                        error = %e,
                        backoff_ms = wait.as_millis() as u64,
                        "result artifact is locked; retrying"
                    );
                    if !pause(wait, cancel).await {
                        return Err(ReadOutcome::Cancelled);
                    }
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), attempt, error = %e, "failed to read result artifact");
                    return Err(ReadOutcome::ReadFailed(format!(
                        "failed to read {} after {attempt} attempt(s): {e}",
                        path.display()
                    )));
                }
            }
        }
    }
}

/// Sleep for `duration` unless cancelled first. Returns `false` on cancel.
async fn pause(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(duration) => true,
    }
}
