//! Configuration file management for lessonhost.
//!
//! Provides a TOML-based config file at `~/.config/lessonhost/config.toml`
//! and a resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use lessonhost_core::HandoffConfig;
use lessonhost_core::reader::MIN_POLL_INTERVAL;
use lessonhost_core::worker::DEFAULT_LESSON_TIMEOUT;

pub const WORKER_BIN_ENV: &str = "LESSONHOST_WORKER_BIN";
pub const RESULT_DIR_ENV: &str = "LESSONHOST_RESULT_DIR";
pub const FILE_DEADLINE_ENV: &str = "LESSONHOST_FILE_DEADLINE_MS";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub worker: WorkerSection,
    pub handoff: HandoffSection,
}

#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSection {
    /// Worker executable. Defaults to this binary.
    pub binary: Option<PathBuf>,
    /// Directory result artifacts are written to. Defaults to the OS temp dir.
    pub result_dir: Option<PathBuf>,
    pub lesson_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandoffSection {
    pub poll_interval_ms: Option<u64>,
    pub file_deadline_ms: Option<u64>,
    pub stabilization_ms: Option<u64>,
    pub read_attempts: Option<u32>,
    pub read_backoff_ms: Option<u64>,
    pub read_backoff_max_ms: Option<u64>,
    pub worker_deadline_secs: Option<u64>,
}

impl ConfigFile {
    /// A file with every setting spelled out at its default, for `init`.
    pub fn with_defaults() -> Self {
        let handoff = HandoffConfig::default();
        Self {
            worker: WorkerSection {
                binary: None,
                result_dir: None,
                lesson_timeout_secs: Some(DEFAULT_LESSON_TIMEOUT.as_secs()),
            },
            handoff: HandoffSection {
                poll_interval_ms: Some(millis(handoff.poll_interval)),
                file_deadline_ms: Some(millis(handoff.file_deadline)),
                stabilization_ms: Some(millis(handoff.stabilization)),
                read_attempts: Some(handoff.read_attempts),
                read_backoff_ms: Some(millis(handoff.read_backoff)),
                read_backoff_max_ms: Some(millis(handoff.read_backoff_max)),
                worker_deadline_secs: Some(handoff.worker_deadline.as_secs()),
            },
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the lessonhost config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/lessonhost` or
/// `~/.config/lessonhost`, including on macOS.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("lessonhost");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("lessonhost")
}

/// Return the path to the lessonhost config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load the config file at `path`. A missing file yields the empty config;
/// a file that exists but cannot be read or parsed is an error.
pub fn load_config_from(path: &Path) -> Result<ConfigFile> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ConfigFile::default()),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("failed to read config file at {}", path.display()));
        }
    };
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))
}

/// Load the config file from its default location.
pub fn load_config() -> Result<ConfigFile> {
    load_config_from(&config_path())
}

/// Serialize and write the config file, creating parent dirs as needed.
pub fn save_config_to(path: &Path, config: &ConfigFile) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }
    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;
    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug, Clone)]
pub struct LessonhostConfig {
    pub worker_binary: PathBuf,
    pub result_dir: PathBuf,
    pub lesson_timeout: Duration,
    pub handoff: HandoffConfig,
}

impl LessonhostConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config
    /// file > default.
    ///
    /// - Worker binary: `--worker-bin` > `LESSONHOST_WORKER_BIN` > `worker.binary` > this executable
    /// - Result dir: `--result-dir` > `LESSONHOST_RESULT_DIR` > `worker.result_dir` > OS temp dir
    /// - File deadline: `LESSONHOST_FILE_DEADLINE_MS` > `handoff.file_deadline_ms` > 30 s
    pub fn resolve(cli_worker_bin: Option<&Path>, cli_result_dir: Option<&Path>) -> Result<Self> {
        let file = load_config()?;
        Self::resolve_with(file, cli_worker_bin, cli_result_dir)
    }

    fn resolve_with(
        file: ConfigFile,
        cli_worker_bin: Option<&Path>,
        cli_result_dir: Option<&Path>,
    ) -> Result<Self> {
        let worker_binary = if let Some(bin) = cli_worker_bin {
            bin.to_path_buf()
        } else if let Some(bin) = env_path(WORKER_BIN_ENV) {
            bin
        } else if let Some(bin) = file.worker.binary {
            bin
        } else {
            std::env::current_exe().context("failed to locate the lessonhost executable")?
        };

        let result_dir = if let Some(dir) = cli_result_dir {
            dir.to_path_buf()
        } else if let Some(dir) = env_path(RESULT_DIR_ENV) {
            dir
        } else if let Some(dir) = file.worker.result_dir {
            dir
        } else {
            std::env::temp_dir()
        };

        let lesson_timeout = file
            .worker
            .lesson_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_LESSON_TIMEOUT);

        let defaults = HandoffConfig::default();
        let section = file.handoff;
        let file_deadline = match std::env::var(FILE_DEADLINE_ENV) {
            Ok(raw) => Duration::from_millis(
                raw.trim()
                    .parse()
                    .with_context(|| format!("{FILE_DEADLINE_ENV} is not a number: {raw:?}"))?,
            ),
            Err(_) => section
                .file_deadline_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.file_deadline),
        };

        let handoff = HandoffConfig {
            poll_interval: section
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval)
                .max(MIN_POLL_INTERVAL),
            file_deadline,
            stabilization: section
                .stabilization_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.stabilization),
            read_attempts: section.read_attempts.unwrap_or(defaults.read_attempts),
            read_backoff: section
                .read_backoff_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.read_backoff),
            read_backoff_max: section
                .read_backoff_max_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.read_backoff_max),
            worker_deadline: section
                .worker_deadline_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.worker_deadline),
        };

        Ok(Self {
            worker_binary,
            result_dir,
            lesson_timeout,
            handoff,
        })
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        crate::test_util::lock_env()
    }

    fn clear_env() {
        unsafe { std::env::remove_var(WORKER_BIN_ENV) };
        unsafe { std::env::remove_var(RESULT_DIR_ENV) };
        unsafe { std::env::remove_var(FILE_DEADLINE_ENV) };
    }

    #[test]
    fn save_and_load_config_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("lessonhost").join("config.toml");

        let original = ConfigFile::with_defaults();
        save_config_to(&path, &original).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn missing_file_is_empty_config() {
        let tmp = tempfile::TempDir::new().unwrap();
        let loaded = load_config_from(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(loaded, ConfigFile::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[handoff]\nread_attempts = 9\n").unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.handoff.read_attempts, Some(9));
        assert_eq!(loaded.worker, WorkerSection::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[handoff\nread_attempts = ").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse config file"));
    }

    #[test]
    fn resolve_with_cli_flags_overrides_all() {
        let _lock = lock_env();
        clear_env();
        unsafe { std::env::set_var(WORKER_BIN_ENV, "/env/worker") };
        unsafe { std::env::set_var(RESULT_DIR_ENV, "/env/results") };

        let file = ConfigFile {
            worker: WorkerSection {
                binary: Some("/file/worker".into()),
                result_dir: Some("/file/results".into()),
                lesson_timeout_secs: None,
            },
            ..ConfigFile::default()
        };
        let config = LessonhostConfig::resolve_with(
            file,
            Some(Path::new("/cli/worker")),
            Some(Path::new("/cli/results")),
        )
        .unwrap();

        assert_eq!(config.worker_binary, PathBuf::from("/cli/worker"));
        assert_eq!(config.result_dir, PathBuf::from("/cli/results"));
        clear_env();
    }

    #[test]
    fn resolve_with_env_var_overrides_config_file() {
        let _lock = lock_env();
        clear_env();
        unsafe { std::env::set_var(WORKER_BIN_ENV, "/env/worker") };
        unsafe { std::env::set_var(FILE_DEADLINE_ENV, "1500") };

        let mut file = ConfigFile::with_defaults();
        file.worker.binary = Some("/file/worker".into());
        file.worker.result_dir = Some("/file/results".into());
        let config = LessonhostConfig::resolve_with(file, None, None).unwrap();

        assert_eq!(config.worker_binary, PathBuf::from("/env/worker"));
        assert_eq!(config.result_dir, PathBuf::from("/file/results"));
        assert_eq!(config.handoff.file_deadline, Duration::from_millis(1500));
        clear_env();
    }

    #[test]
    fn resolve_defaults_when_nothing_set() {
        let _lock = lock_env();
        clear_env();

        let config = LessonhostConfig::resolve_with(ConfigFile::default(), None, None).unwrap();

        assert_eq!(config.worker_binary, std::env::current_exe().unwrap());
        assert_eq!(config.result_dir, std::env::temp_dir());
        assert_eq!(config.lesson_timeout, DEFAULT_LESSON_TIMEOUT);
        assert_eq!(config.handoff, HandoffConfig::default());
    }

    #[test]
    fn zero_poll_interval_is_raised_to_floor() {
        let _lock = lock_env();
        clear_env();

        let mut file = ConfigFile::default();
        file.handoff.poll_interval_ms = Some(0);
        let config = LessonhostConfig::resolve_with(file, None, None).unwrap();

        assert_eq!(config.handoff.poll_interval, MIN_POLL_INTERVAL);
    }

    #[test]
    fn invalid_deadline_env_is_an_error() {
        let _lock = lock_env();
        clear_env();
        unsafe { std::env::set_var(FILE_DEADLINE_ENV, "soon") };

        let result = LessonhostConfig::resolve_with(ConfigFile::default(), None, None);
        clear_env();

        let msg = format!("{:#}", result.unwrap_err());
        assert!(msg.contains(FILE_DEADLINE_ENV), "unexpected error: {msg}");
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let path = config_path();
        assert!(
            path.ends_with("lessonhost/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }
}
