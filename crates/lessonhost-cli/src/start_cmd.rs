//! `lessonhost start`: the interactive control plane.
//!
//! Collects the invocation through the console, hands it to a worker
//! process, and presents whatever comes back.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use lessonhost_core::LessonRegistry;
use lessonhost_core::flow::InteractionFlow;
use lessonhost_core::interaction::Prompt;
use lessonhost_core::launcher::ProcessLauncher;
use lessonhost_core::session::{HandoffOutcome, run_handoff};

use crate::config::{LessonhostConfig, RESULT_DIR_ENV};
use crate::console::ConsoleInteraction;

pub async fn run_start(config: &LessonhostConfig, display: bool) -> Result<()> {
    let registry = LessonRegistry::builtin()?;
    let console = ConsoleInteraction::new();
    let flow = InteractionFlow::new(&registry, &console);

    let configured = if display {
        flow.configure_display_run().await?
    } else {
        flow.configure_lesson_run().await?
    };
    let Prompt::Answered(invocation) = configured else {
        tracing::info!("run cancelled before start");
        return Ok(());
    };

    // Ctrl+C: first press stops the worker, second forces exit.
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    let got_first_signal = Arc::new(AtomicBool::new(false));
    let got_first_clone = Arc::clone(&got_first_signal);

    tokio::spawn(async move {
        loop {
            tokio::signal::ctrl_c().await.ok();
            if got_first_clone.swap(true, Ordering::SeqCst) {
                eprintln!("\nForce exit.");
                std::process::exit(130);
            }
            eprintln!("\nStopping worker (Ctrl+C again to force)...");
            cancel_clone.cancel();
        }
    });

    let launcher = ProcessLauncher::new(&config.worker_binary)
        .with_env(RESULT_DIR_ENV, config.result_dir.display().to_string());

    tracing::info!(
        worker = %config.worker_binary.display(),
        invocation = %invocation,
        "starting worker"
    );
    println!("Running...");

    let outcome = run_handoff(&launcher, invocation, &config.handoff, &cancel).await;
    tracing::info!(outcome = ?outcome, "handoff finished");

    flow.present_outcome(&outcome).await;

    if outcome == HandoffOutcome::Cancelled {
        std::process::exit(130);
    }
    Ok(())
}
