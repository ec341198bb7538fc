//! Lesson registry -- the explicitly registered set of runnable lessons.
//!
//! Both processes build the same registry: the control plane to present the
//! lesson choice, the worker to resolve the display name it was started with.

use std::collections::HashMap;

use super::{ARGUMENT_SEPARATOR, Lesson, LessonDescriptor};

/// Errors raised while registering lessons.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("duplicate lesson display name: {0:?}")]
    DuplicateName(String),

    #[error("lesson display name must not be blank")]
    BlankName,

    #[error("lesson display name {0:?} contains a reserved character")]
    InvalidName(String),
}

/// A collection of registered [`Lesson`] implementations, ordered by
/// [`super::GroupOrder`] and keyed case-insensitively by display name.
#[derive(Default)]
pub struct LessonRegistry {
    lessons: Vec<Box<dyn Lesson>>,
    by_name: HashMap<String, usize>,
}

impl LessonRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a lesson.
    ///
    /// Fails if the display name is blank, contains the argument separator
    /// or a control character, or collides (ignoring case) with a lesson
    /// already registered.
    pub fn register(&mut self, lesson: impl Lesson + 'static) -> Result<(), RegistryError> {
        let name = lesson.descriptor().display_name.clone();
        validate_display_name(&name)?;

        let key = name_key(&name);
        if self.by_name.contains_key(&key) {
            return Err(RegistryError::DuplicateName(name));
        }

        self.lessons.push(Box::new(lesson));
        self.lessons.sort_by(|a, b| {
            let (a, b) = (a.descriptor(), b.descriptor());
            a.group_order
                .cmp(&b.group_order)
                .then_with(|| a.display_name.cmp(&b.display_name))
        });
        self.reindex();
        Ok(())
    }

    fn reindex(&mut self) {
        self.by_name = self
            .lessons
            .iter()
            .enumerate()
            .map(|(i, l)| (name_key(&l.descriptor().display_name), i))
            .collect();
    }

    /// Descriptors of every registered lesson, sorted by group order.
    pub fn discover(&self) -> Vec<LessonDescriptor> {
        self.lessons.iter().map(|l| l.descriptor().clone()).collect()
    }

    /// Look up a lesson by display name, ignoring case and surrounding
    /// whitespace.
    pub fn lookup(&self, display_name: &str) -> Option<&dyn Lesson> {
        self.by_name
            .get(&name_key(display_name))
            .map(|&i| self.lessons[i].as_ref())
    }

    /// Look up only the descriptor of a lesson.
    pub fn descriptor(&self, display_name: &str) -> Option<&LessonDescriptor> {
        self.lookup(display_name).map(|l| l.descriptor())
    }

    /// Return the number of registered lessons.
    pub fn len(&self) -> usize {
        self.lessons.len()
    }

    /// Return `true` if no lessons are registered.
    pub fn is_empty(&self) -> bool {
        self.lessons.is_empty()
    }
}

impl std::fmt::Debug for LessonRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LessonRegistry")
            .field(
                "lessons",
                &self
                    .lessons
                    .iter()
                    .map(|l| l.descriptor().display_name.as_str())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Check that a display name can travel as a single worker argument.
pub fn validate_display_name(name: &str) -> Result<(), RegistryError> {
    if name.trim().is_empty() {
        return Err(RegistryError::BlankName);
    }
    if name.contains(ARGUMENT_SEPARATOR) || name.chars().any(char::is_control) {
        return Err(RegistryError::InvalidName(name.to_string()));
    }
    Ok(())
}
