//! Child-process launcher.
//!
//! Spawns `<binary> [leading args...] <verb> <args...>` with stdout piped and
//! streams its lines. Stderr is inherited so worker logs reach the terminal
//! without passing through the sentinel watcher.

use std::collections::HashMap;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::Stream;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{WorkerHandle, WorkerLauncher, WorkerLine};
use crate::flow::Invocation;

const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(5);
const WAIT_POLL: Duration = Duration::from_millis(50);

/// Internal state kept per spawned process.
struct ProcessState {
    child: Child,
    /// `Option` so it can be taken once for streaming.
    stdout: Option<ChildStdout>,
}

/// Launches workers as child processes of the control plane.
#[derive(Clone)]
pub struct ProcessLauncher {
    binary: PathBuf,
    leading_args: Vec<String>,
    env: Vec<(String, String)>,
    kill_grace: Duration,
    processes: Arc<Mutex<HashMap<u32, ProcessState>>>,
}

impl std::fmt::Debug for ProcessLauncher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessLauncher")
            .field("binary", &self.binary)
            .field("leading_args", &self.leading_args)
            .finish()
    }
}

impl ProcessLauncher {
    /// Launch `binary` for every invocation.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            leading_args: Vec::new(),
            env: Vec::new(),
            kill_grace: DEFAULT_KILL_GRACE,
            processes: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Arguments placed before the invocation's own, e.g. a script path
    /// when `binary` is an interpreter.
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Add an environment variable to every worker.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// How long [`WorkerLauncher::kill`] waits after SIGTERM.
    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    pub fn binary(&self) -> &std::path::Path {
        &self.binary
    }

    /// Number of workers still tracked (started, not yet killed, waited on
    /// or detached).
    pub async fn tracked(&self) -> usize {
        self.processes.lock().await.len()
    }

    /// Whether the worker behind `handle` is still alive.
    pub async fn is_running(&self, handle: &WorkerHandle) -> bool {
        let mut processes = self.processes.lock().await;
        let Some(state) = processes.get_mut(&handle.pid) else {
            return false;
        };
        match state.child.try_wait() {
            Ok(Some(_status)) => false,
            Ok(None) => true,
            Err(e) => {
                warn!(pid = handle.pid, error = %e, "error checking worker status");
                false
            }
        }
    }
}

#[async_trait]
impl WorkerLauncher for ProcessLauncher {
    fn name(&self) -> &str {
        "process"
    }

    async fn start(&self, invocation: &Invocation) -> Result<WorkerHandle> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(&self.leading_args).args(invocation.to_args());
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd.stdin(std::process::Stdio::null());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::inherit());

        let mut child = cmd.spawn().with_context(|| {
            format!(
                "failed to spawn worker binary at '{}'",
                self.binary.display()
            )
        })?;
        let pid = child.id().context("worker process has no pid")?;
        let stdout = child.stdout.take();

        debug!(pid, args = %invocation, "worker started");
        self.processes
            .lock()
            .await
            .insert(pid, ProcessState { child, stdout });

        Ok(WorkerHandle {
            pid,
            launcher_name: self.name().to_string(),
        })
    }

    fn lines(&self, handle: &WorkerHandle) -> Pin<Box<dyn Stream<Item = WorkerLine> + Send>> {
        let pid = handle.pid;
        let processes = Arc::clone(&self.processes);

        let stream = async_stream::stream! {
            let stdout = {
                let mut procs = processes.lock().await;
                procs.get_mut(&pid).and_then(|state| state.stdout.take())
            };

            let Some(stdout) = stdout else {
                warn!(pid, "no stdout available for worker -- already consumed or process missing");
                yield WorkerLine::Error {
                    message: "stdout not available (already consumed or process not found)".to_string(),
                };
                yield WorkerLine::Closed;
                return;
            };

            // Lessons may print non-UTF-8 bytes; decode lossily per line.
            let mut reader = BufReader::new(stdout);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => break,
                    Ok(_) => yield WorkerLine::Stdout(decode_line(&buf)),
                    Err(e) => {
                        warn!(pid, error = %e, "error reading worker stdout");
                        yield WorkerLine::Error {
                            message: format!("stdout read error: {e}"),
                        };
                        break;
                    }
                }
            }

            yield WorkerLine::Closed;
        };

        Box::pin(stream)
    }

    async fn kill(&self, handle: &WorkerHandle) -> Result<()> {
        let pid = handle.pid;
        let mut processes = self.processes.lock().await;

        let Some(mut state) = processes.remove(&pid) else {
            debug!(pid, "kill called but worker not tracked (already exited?)");
            return Ok(());
        };
        drop(processes);

        if let Ok(Some(status)) = state.child.try_wait() {
            debug!(pid, ?status, "worker already exited");
            return Ok(());
        }

        #[cfg(unix)]
        {
            // SAFETY: pid belongs to a child we spawned and have not reaped.
            let ret = unsafe { libc::kill(pid as i32, libc::SIGTERM) };
            if ret != 0 {
                warn!(pid, "SIGTERM failed, proceeding to SIGKILL");
            }
        }

        match tokio::time::timeout(self.kill_grace, state.child.wait()).await {
            Ok(Ok(status)) => debug!(pid, ?status, "worker exited after SIGTERM"),
            _ => {
                debug!(pid, "worker did not exit after SIGTERM, sending SIGKILL");
                state
                    .child
                    .kill()
                    .await
                    .with_context(|| format!("failed to kill worker {pid}"))?;
            }
        }
        Ok(())
    }

    async fn wait(&self, handle: &WorkerHandle) -> Result<Option<i32>> {
        let pid = handle.pid;
        loop {
            {
                let mut processes = self.processes.lock().await;
                let Some(state) = processes.get_mut(&pid) else {
                    return Ok(None);
                };
                if let Some(status) = state
                    .child
                    .try_wait()
                    .with_context(|| format!("failed to poll worker {pid}"))?
                {
                    processes.remove(&pid);
                    return Ok(status.code());
                }
            }
            tokio::time::sleep(WAIT_POLL).await;
        }
    }

    async fn detach(&self, handle: &WorkerHandle) {
        let pid = handle.pid;
        let Some(mut state) = self.processes.lock().await.remove(&pid) else {
            return;
        };
        if let Ok(Some(status)) = state.child.try_wait() {
            debug!(pid, ?status, "detached worker had already exited");
            return;
        }
        tokio::spawn(async move {
            match state.child.wait().await {
                Ok(status) => debug!(pid, ?status, "detached worker exited"),
                Err(e) => warn!(pid, error = %e, "failed to reap detached worker"),
            }
        });
    }
}

/// Lossily decode one raw output line, dropping its line terminator.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    /// Run `body` as a `/bin/sh` script so no executable bit is needed.
    fn sh_launcher(dir: &std::path::Path, body: &str) -> ProcessLauncher {
        let script = dir.join("worker.sh");
        std::fs::write(&script, body).unwrap();
        ProcessLauncher::new("/bin/sh").with_leading_args([script.to_string_lossy().into_owned()])
    }

    #[tokio::test]
    async fn streams_lines_then_closed() {
        let tmp = tempfile::tempdir().unwrap();
        let launcher = sh_launcher(tmp.path(), "echo \"verb=$1\"\necho \"msg=$2\"\n");

        let handle = launcher.start(&Invocation::display("hi there")).await.unwrap();
        assert!(handle.pid > 0);
        assert_eq!(handle.launcher_name, "process");

        let lines: Vec<WorkerLine> = launcher.lines(&handle).collect().await;
        assert_eq!(
            lines,
            vec![
                WorkerLine::Stdout("verb=display".to_string()),
                WorkerLine::Stdout("msg=hi there".to_string()),
                WorkerLine::Closed,
            ]
        );
        assert_eq!(launcher.wait(&handle).await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn invalid_utf8_line_does_not_end_the_stream() {
        let tmp = tempfile::tempdir().unwrap();
        let launcher = sh_launcher(tmp.path(), "printf 'caf\\351\\r\\n'\necho after\n");
        let handle = launcher.start(&Invocation::display("x")).await.unwrap();

        let lines: Vec<WorkerLine> = launcher.lines(&handle).collect().await;
        assert_eq!(
            lines,
            vec![
                WorkerLine::Stdout("caf\u{FFFD}".to_string()),
                WorkerLine::Stdout("after".to_string()),
                WorkerLine::Closed,
            ]
        );
    }

    #[test]
    fn decode_line_strips_terminators_only() {
        assert_eq!(decode_line(b"plain\n"), "plain");
        assert_eq!(decode_line(b"crlf\r\n"), "crlf");
        assert_eq!(decode_line(b"last line"), "last line");
        assert_eq!(decode_line(b" spaced \n"), " spaced ");
    }

    #[tokio::test]
    async fn detach_stops_tracking_a_running_worker() {
        let tmp = tempfile::tempdir().unwrap();
        let launcher = sh_launcher(tmp.path(), "sleep 1\n");
        let handle = launcher.start(&Invocation::display("x")).await.unwrap();
        assert_eq!(launcher.tracked().await, 1);

        launcher.detach(&handle).await;
        assert_eq!(launcher.tracked().await, 0);
        assert!(!launcher.is_running(&handle).await);
        // Detaching again is a no-op.
        launcher.detach(&handle).await;
    }

    #[tokio::test]
    async fn lines_can_only_be_taken_once() {
        let tmp = tempfile::tempdir().unwrap();
        let launcher = sh_launcher(tmp.path(), "echo once\n");
        let handle = launcher.start(&Invocation::display("x")).await.unwrap();

        let _first: Vec<WorkerLine> = launcher.lines(&handle).collect().await;
        let second: Vec<WorkerLine> = launcher.lines(&handle).collect().await;
        assert!(matches!(second[0], WorkerLine::Error { .. }));
        assert_eq!(second.last(), Some(&WorkerLine::Closed));
    }

    #[tokio::test]
    async fn env_vars_reach_the_worker() {
        let tmp = tempfile::tempdir().unwrap();
        let launcher =
            sh_launcher(tmp.path(), "echo \"$LESSON_TEST_VAR\"\n").with_env("LESSON_TEST_VAR", "42");
        let handle = launcher.start(&Invocation::display("x")).await.unwrap();

        let lines: Vec<WorkerLine> = launcher.lines(&handle).collect().await;
        assert_eq!(lines[0], WorkerLine::Stdout("42".to_string()));
    }

    #[tokio::test]
    async fn exit_code_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let launcher = sh_launcher(tmp.path(), "exit 3\n");
        let handle = launcher.start(&Invocation::display("x")).await.unwrap();
        assert_eq!(launcher.wait(&handle).await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn kill_stops_a_hanging_worker() {
        let tmp = tempfile::tempdir().unwrap();
        let launcher = sh_launcher(tmp.path(), "sleep 30\n").with_kill_grace(Duration::from_secs(2));
        let handle = launcher.start(&Invocation::display("x")).await.unwrap();
        assert!(launcher.is_running(&handle).await);

        launcher.kill(&handle).await.unwrap();
        assert!(!launcher.is_running(&handle).await);
        // Killing again is a no-op.
        launcher.kill(&handle).await.unwrap();
    }

    #[tokio::test]
    async fn missing_binary_fails_to_start() {
        let launcher = ProcessLauncher::new("/nonexistent/lessonhost-worker");
        let err = launcher.start(&Invocation::display("x")).await.unwrap_err();
        assert!(format!("{err:#}").contains("failed to spawn worker binary"));
    }
}
