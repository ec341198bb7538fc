//! Core of lessonhost: the lesson registry, the worker-side runner, and the
//! control-plane side of the result handoff protocol.
//!
//! ```text
//! control plane                                   worker process
//! -------------                                   --------------
//! flow::InteractionFlow --Invocation--> launcher --> worker::WorkerRunner
//!                                                        |
//!                                          artifact file + sentinel line
//!                                                        |
//! sentinel::OutputWatcher <----------- stdout lines -----+
//!        |
//! reader::ArtifactReader --ResultArtifact--> flow::present_result
//! ```

pub mod artifact;
pub mod config;
pub mod flow;
pub mod interaction;
pub mod launcher;
pub mod lesson;
pub mod reader;
pub mod sentinel;
pub mod session;
pub mod worker;

pub use artifact::ResultArtifact;
pub use config::HandoffConfig;
pub use lesson::{Lesson, LessonDescriptor, LessonRegistry};
