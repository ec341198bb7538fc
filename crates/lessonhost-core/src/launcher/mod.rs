//! The `WorkerLauncher` trait -- starts and stops worker processes.
//!
//! The control plane never talks to a worker except through its command
//! line (an [`Invocation`]) and its stdout lines. The trait is object-safe
//! so sessions take `&dyn WorkerLauncher`.

pub mod process;

use std::pin::Pin;

use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;

use crate::flow::Invocation;

pub use process::ProcessLauncher;

/// Identifies one started worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerHandle {
    /// OS process id.
    pub pid: u32,
    /// Name of the launcher that started it.
    pub launcher_name: String,
}

/// One item of a worker's output stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerLine {
    /// A line of stdout, without its terminator.
    Stdout(String),
    /// Reading stdout failed; the stream ends after this.
    Error { message: String },
    /// Stdout closed. Always the last item.
    Closed,
}

/// Adapter interface for running workers.
#[async_trait]
pub trait WorkerLauncher: Send + Sync {
    /// Human-readable name (e.g. "process").
    fn name(&self) -> &str;

    /// Start a worker for `invocation`.
    async fn start(&self, invocation: &Invocation) -> Result<WorkerHandle>;

    /// Stream the worker's stdout. The stream yields [`WorkerLine::Closed`]
    /// last. It can be taken once per handle.
    fn lines(&self, handle: &WorkerHandle) -> Pin<Box<dyn Stream<Item = WorkerLine> + Send>>;

    /// Stop the worker: SIGTERM, a grace period, then SIGKILL.
    async fn kill(&self, handle: &WorkerHandle) -> Result<()>;

    /// Wait for the worker to exit and return its exit code, if any.
    async fn wait(&self, handle: &WorkerHandle) -> Result<Option<i32>>;

    /// Stop tracking the worker without stopping it. The worker is reaped in
    /// the background once it exits.
    async fn detach(&self, handle: &WorkerHandle);
}

const _: () = {
    fn _assert_object_safe(_: &dyn WorkerLauncher) {}
};
