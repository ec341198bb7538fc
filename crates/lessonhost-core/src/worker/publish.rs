//! Write-side of the handoff: persist the artifact and announce it.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use uuid::Uuid;

use crate::artifact::ResultArtifact;
use crate::sentinel::{self, MAX_INLINE_SENTINEL_BYTES};

/// How an artifact was handed to the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Written to this file and announced with the file sentinel.
    File(PathBuf),
    /// The file write failed; the artifact was sent on the inline sentinel.
    Inline,
    /// Nothing was announced. The control plane will report "no result".
    Dropped { reason: String },
}

impl PublishOutcome {
    /// Whether a sentinel line reached the output.
    pub fn announced(&self) -> bool {
        !matches!(self, Self::Dropped { .. })
    }
}

/// Writes result artifacts into a directory and prints the sentinel line.
#[derive(Debug, Clone)]
pub struct Publisher {
    result_dir: PathBuf,
}

impl Default for Publisher {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl Publisher {
    pub fn new(result_dir: impl Into<PathBuf>) -> Self {
        Self {
            result_dir: result_dir.into(),
        }
    }

    pub fn result_dir(&self) -> &Path {
        &self.result_dir
    }

    /// A path no earlier invocation has used.
    fn fresh_path(&self) -> PathBuf {
        self.result_dir
            .join(format!("lesson-result-{}.json", Uuid::new_v4().simple()))
    }

    /// Serialize `artifact`, write it to a fresh file, and print the file
    /// sentinel to `out`.
    ///
    /// If the file cannot be written the artifact is printed inline
    /// instead, provided the line fits in [`MAX_INLINE_SENTINEL_BYTES`].
    /// Larger artifacts are dropped with an error log.
    pub fn publish(&self, artifact: &ResultArtifact, out: &mut impl Write) -> PublishOutcome {
        if artifact.success {
            tracing::info!(
                input = artifact.input.as_deref().unwrap_or(""),
                "lesson run successful"
            );
        } else {
            tracing::error!(
                input = artifact.input.as_deref().unwrap_or(""),
                error = artifact.error_message.as_deref().unwrap_or(""),
                "lesson run failed"
            );
        }

        let json = match artifact.to_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize result artifact");
                return PublishOutcome::Dropped {
                    reason: format!("serialization failed: {e}"),
                };
            }
        };

        let path = self.fresh_path();
        match write_artifact(&path, &json) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "wrote result artifact");
                match emit(out, &sentinel::file_sentinel(&path)) {
                    Ok(()) => return PublishOutcome::File(path),
                    Err(e) => {
                        tracing::error!(error = %e, "failed to print result sentinel");
                        return PublishOutcome::Dropped {
                            reason: format!("stdout write failed: {e}"),
                        };
                    }
                }
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %format!("{e:#}"), "failed to write result artifact");
            }
        }

        let line = sentinel::inline_sentinel(&json);
        if line.len() > MAX_INLINE_SENTINEL_BYTES {
            tracing::error!(
                length = line.len(),
                limit = MAX_INLINE_SENTINEL_BYTES,
                "result artifact too large to send inline; dropping it"
            );
            return PublishOutcome::Dropped {
                reason: format!(
                    "inline artifact of {} bytes exceeds the {MAX_INLINE_SENTINEL_BYTES} byte limit",
                    line.len()
                ),
            };
        }
        match emit(out, &line) {
            Ok(()) => PublishOutcome::Inline,
            Err(e) => PublishOutcome::Dropped {
                reason: format!("stdout write failed: {e}"),
            },
        }
    }
}

fn write_artifact(path: &Path, json: &str) -> Result<()> {
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    file.write_all(json.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;
    file.sync_all()
        .with_context(|| format!("failed to flush {}", path.display()))?;
    Ok(())
}

fn emit(out: &mut impl Write, line: &str) -> std::io::Result<()> {
    writeln!(out, "{line}")?;
    out.flush()
}
