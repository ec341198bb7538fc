mod config;
mod console;
mod lessons_cmd;
mod start_cmd;
mod worker_cmd;

#[cfg(test)]
mod test_util;

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};

use config::LessonhostConfig;

#[derive(Parser)]
#[command(
    name = "lessonhost",
    about = "Run workshop lessons in an isolated worker process"
)]
struct Cli {
    /// Worker executable (overrides LESSONHOST_WORKER_BIN env var)
    #[arg(long, global = true)]
    worker_bin: Option<PathBuf>,

    /// Directory result artifacts are written to (overrides LESSONHOST_RESULT_DIR env var)
    #[arg(long, global = true)]
    result_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pick a lesson, run it in a worker, and show the result
    Start {
        /// Skip lesson selection and run the single-shot display worker
        #[arg(long)]
        display: bool,
    },
    /// List the registered lessons
    Lessons,
    /// Write a lessonhost config file with every setting at its default
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Print a shell completion script
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
    /// Worker entry point: run a lesson and announce its result artifact
    Execute {
        /// Free-text input for the lesson
        message: String,
        /// Display name of the lesson to run
        lesson: String,
    },
    /// Worker entry point: echo a message back as the result artifact
    Display {
        /// Message to return
        message: String,
    },
}

fn cmd_init(force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    config::save_config_to(&path, &config::ConfigFile::with_defaults())?;

    println!("Config written to {}", path.display());
    Ok(())
}

fn cmd_completions(shell: clap_complete::Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // stdout belongs to prompts and sentinel lines; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => cmd_init(force)?,
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Lessons => lessons_cmd::run_lessons()?,
        Commands::Start { display } => {
            let resolved =
                LessonhostConfig::resolve(cli.worker_bin.as_deref(), cli.result_dir.as_deref())?;
            start_cmd::run_start(&resolved, display).await?;
        }
        Commands::Execute { message, lesson } => {
            let resolved =
                LessonhostConfig::resolve(cli.worker_bin.as_deref(), cli.result_dir.as_deref())?;
            if !worker_cmd::run_execute(&resolved, &message, &lesson).await? {
                std::process::exit(1);
            }
        }
        Commands::Display { message } => {
            let resolved =
                LessonhostConfig::resolve(cli.worker_bin.as_deref(), cli.result_dir.as_deref())?;
            if !worker_cmd::run_display(&resolved, &message)? {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
