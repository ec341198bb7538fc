//! Lesson interface and declarative lesson metadata.
//!
//! This module defines the [`Lesson`] trait that every lesson implements,
//! the [`LessonDescriptor`] metadata it exposes, and the [`LessonRegistry`]
//! for lookup by display name.
//!
//! # Architecture
//!
//! ```text
//! LessonRegistry::builtin()
//!     |
//!     |-- register(HelloWorkshop) ----+
//!     |-- register(Echo) -------------+--> sorted by (major, minor)
//!     |
//!     |   discover() --> Vec<LessonDescriptor>   (control plane prompts)
//!     |   lookup("echo") --> &dyn Lesson          (worker executes)
//!     |        |
//!     |        v
//!     |   run(input) --> Result<String>
//! ```

pub mod builtin;
pub mod registry;

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;

pub use registry::{LessonRegistry, RegistryError};

/// Characters that may not appear in a display name. The comma is the
/// separator used when an invocation's arguments are echoed as one line.
pub const ARGUMENT_SEPARATOR: char = ',';

/// Ordering key for lessons: workshop part, then position within the part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct GroupOrder {
    pub major: u32,
    pub minor: u32,
}

impl GroupOrder {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for GroupOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Declarative metadata for one lesson.
///
/// Use [`LessonDescriptor::new`] for the required fields, then chain the
/// optional prompt setters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonDescriptor {
    /// Short stable identifier, echoed back as the artifact's `lessonId`.
    pub id: String,
    /// Unique name shown to the user and passed to the worker.
    pub display_name: String,
    pub group_order: GroupOrder,
    /// Whether the control plane must collect free text before starting.
    pub needs_input: bool,
    pub input_prompt_title: Option<String>,
    pub input_prompt_message: Option<String>,
    pub informational_title: Option<String>,
    pub informational_message: Option<String>,
}

impl LessonDescriptor {
    /// Create a descriptor with no prompt customisation and no input.
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        group_order: GroupOrder,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            group_order,
            needs_input: false,
            input_prompt_title: None,
            input_prompt_message: None,
            informational_title: None,
            informational_message: None,
        }
    }

    /// Require free-text input.
    pub fn needs_input(mut self) -> Self {
        self.needs_input = true;
        self
    }

    /// Set the label and message of the input prompt.
    pub fn input_prompt(mut self, title: impl Into<String>, message: impl Into<String>) -> Self {
        self.input_prompt_title = Some(title.into());
        self.input_prompt_message = Some(message.into());
        self
    }

    /// Set the informational screen shown before the input prompt.
    pub fn informational(mut self, title: impl Into<String>, message: impl Into<String>) -> Self {
        self.informational_title = Some(title.into());
        self.informational_message = Some(message.into());
        self
    }

    /// Label used in the lesson choice prompt, e.g. `1.5 - Echo`.
    pub fn choice_label(&self) -> String {
        format!("{} - {}", self.group_order, self.display_name)
    }

    /// Whether the informational screen has anything to show.
    pub fn has_informational_screen(&self) -> bool {
        let non_blank = |s: &Option<String>| s.as_deref().is_some_and(|v| !v.trim().is_empty());
        non_blank(&self.informational_title) || non_blank(&self.informational_message)
    }
}

/// A runnable lesson.
///
/// Implementations wrap whatever the lesson actually does (a chat call, a
/// computation) behind one async `run`. Errors are returned, never
/// panicked; the worker converts them into a failed result artifact.
#[async_trait]
pub trait Lesson: Send + Sync {
    /// Metadata for this lesson.
    fn descriptor(&self) -> &LessonDescriptor;

    /// Execute the lesson against the user's input and return its output
    /// (markdown is allowed).
    async fn run(&self, input: &str) -> Result<String>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn Lesson) {}
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_order_sorts_major_then_minor() {
        let mut orders = vec![
            GroupOrder::new(2, 1),
            GroupOrder::new(1, 8),
            GroupOrder::new(1, 5),
            GroupOrder::new(0, 9),
        ];
        orders.sort();
        assert_eq!(
            orders,
            vec![
                GroupOrder::new(0, 9),
                GroupOrder::new(1, 5),
                GroupOrder::new(1, 8),
                GroupOrder::new(2, 1),
            ]
        );
    }

    #[test]
    fn choice_label_includes_order() {
        let d = LessonDescriptor::new("echo", "Echo", GroupOrder::new(1, 5));
        assert_eq!(d.choice_label(), "1.5 - Echo");
    }

    #[test]
    fn informational_screen_requires_non_blank_text() {
        let plain = LessonDescriptor::new("a", "A", GroupOrder::default());
        assert!(!plain.has_informational_screen());

        let blank = plain.clone().informational("  ", "");
        assert!(!blank.has_informational_screen());

        let titled = plain.informational("Heads up", "");
        assert!(titled.has_informational_screen());
    }

    #[test]
    fn builder_sets_prompt_fields() {
        let d = LessonDescriptor::new("x", "X", GroupOrder::new(1, 1))
            .needs_input()
            .input_prompt("Label", "Type something");
        assert!(d.needs_input);
        assert_eq!(d.input_prompt_title.as_deref(), Some("Label"));
        assert_eq!(d.input_prompt_message.as_deref(), Some("Type something"));
    }
}
