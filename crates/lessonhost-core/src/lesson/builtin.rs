//! The lessons shipped with lessonhost.

use std::collections::BTreeSet;

use anyhow::Result;
use async_trait::async_trait;

use super::{GroupOrder, Lesson, LessonDescriptor, LessonRegistry, RegistryError};

impl LessonRegistry {
    /// Build the registry of shipped lessons.
    pub fn builtin() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry.register(HelloWorkshop::new())?;
        registry.register(Echo::new())?;
        registry.register(SentenceStats::new())?;
        registry.register(Exercise::new(
            1,
            GroupOrder::new(1, 8),
            "Apply what you've learned in the previous lessons to build an agent \
             that can analyze sentences.",
            "Enter a sentence for Exercise 1 to analyze:",
        ))?;
        registry.register(Exercise::new(
            3,
            GroupOrder::new(2, 31),
            "Combine several evaluators over the same response and compare \
             their verdicts.",
            "Enter your input for Exercise 3:",
        ))?;
        registry.register(Exercise::new(
            4,
            GroupOrder::new(3, 4),
            "Generate a report of your evaluation runs, saved locally on disk.",
            "Enter your input for Exercise 4:",
        ))?;
        Ok(registry)
    }
}

// ---------------------------------------------------------------------------
// Hello Workshop
// ---------------------------------------------------------------------------

/// Smoke-test lesson: takes no input and returns a fixed markdown greeting.
pub struct HelloWorkshop {
    descriptor: LessonDescriptor,
}

impl HelloWorkshop {
    pub fn new() -> Self {
        Self {
            descriptor: LessonDescriptor::new("hello", "Hello Workshop", GroupOrder::new(0, 1)),
        }
    }
}

impl Default for HelloWorkshop {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Lesson for HelloWorkshop {
    fn descriptor(&self) -> &LessonDescriptor {
        &self.descriptor
    }

    async fn run(&self, _input: &str) -> Result<String> {
        Ok("# Hello World\n\
            We just ran a lesson in a separate worker process and handed its \
            result back to the control plane.\n\n\
            Check the **console** output and the structured **logs** to follow \
            the handoff."
            .to_string())
    }
}

// ---------------------------------------------------------------------------
// Echo
// ---------------------------------------------------------------------------

/// Returns the input, tagged as processed.
pub struct Echo {
    descriptor: LessonDescriptor,
}

impl Echo {
    pub fn new() -> Self {
        Self {
            descriptor: LessonDescriptor::new("echo", "Echo", GroupOrder::new(1, 1)).needs_input(),
        }
    }
}

impl Default for Echo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Lesson for Echo {
    fn descriptor(&self) -> &LessonDescriptor {
        &self.descriptor
    }

    async fn run(&self, input: &str) -> Result<String> {
        Ok(format!("Processed: {input}"))
    }
}

// ---------------------------------------------------------------------------
// Sentence Stats
// ---------------------------------------------------------------------------

/// Counts words, unique words and vowels in a sentence.
pub struct SentenceStats {
    descriptor: LessonDescriptor,
}

impl SentenceStats {
    pub fn new() -> Self {
        Self {
            descriptor: LessonDescriptor::new(
                "sentence-stats",
                "Sentence Stats",
                GroupOrder::new(1, 2),
            )
            .needs_input()
            .informational(
                "Sentence Stats",
                "This lesson answers simple questions about a sentence: how many \
                 words it has, how many of them are unique, and how many vowels \
                 it contains.",
            )
            .input_prompt("Sentence", "Enter a sentence to analyze:"),
        }
    }
}

impl Default for SentenceStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Word, unique-word and vowel counts for a piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextStats {
    pub words: usize,
    pub unique_words: usize,
    pub vowels: usize,
}

impl TextStats {
    pub fn of(text: &str) -> Self {
        let words: Vec<String> = text
            .split_whitespace()
            .map(|w| {
                w.trim_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase()
            })
            .filter(|w| !w.is_empty())
            .collect();
        let unique: BTreeSet<&str> = words.iter().map(String::as_str).collect();
        let vowels = text
            .chars()
            .filter(|c| matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u'))
            .count();
        Self {
            words: words.len(),
            unique_words: unique.len(),
            vowels,
        }
    }
}

#[async_trait]
impl Lesson for SentenceStats {
    fn descriptor(&self) -> &LessonDescriptor {
        &self.descriptor
    }

    async fn run(&self, input: &str) -> Result<String> {
        if input.trim().is_empty() {
            anyhow::bail!("cannot analyze an empty sentence");
        }
        let stats = TextStats::of(input);
        Ok(format!(
            "## Sentence Stats\n\n\
             | Measure | Count |\n\
             |---|---|\n\
             | Words | {} |\n\
             | Unique words | {} |\n\
             | Vowels | {} |\n",
            stats.words, stats.unique_words, stats.vowels
        ))
    }
}

// ---------------------------------------------------------------------------
// Exercises
// ---------------------------------------------------------------------------

/// Placeholder for a hands-on exercise the attendee fills in.
pub struct Exercise {
    number: u32,
    descriptor: LessonDescriptor,
}

impl Exercise {
    pub fn new(number: u32, order: GroupOrder, briefing: &str, prompt: &str) -> Self {
        let descriptor = LessonDescriptor::new(
            format!("exercise-{number}"),
            format!("EXERCISE {number}"),
            order,
        )
        .needs_input()
        .informational(
            format!("Exercise {number}"),
            format!("This is an exercise lesson. {briefing}"),
        )
        .input_prompt(format!("Exercise {number} - Input"), prompt);
        Self { number, descriptor }
    }
}

#[async_trait]
impl Lesson for Exercise {
    fn descriptor(&self) -> &LessonDescriptor {
        &self.descriptor
    }

    async fn run(&self, input: &str) -> Result<String> {
        Ok(format!("Exercise {} placeholder. Input: {input}", self.number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_is_valid_and_sorted() {
        let registry = LessonRegistry::builtin().unwrap();
        let descriptors = registry.discover();
        assert_eq!(descriptors.len(), 6);
        assert_eq!(descriptors[0].display_name, "Hello Workshop");
        assert!(
            descriptors
                .windows(2)
                .all(|w| w[0].group_order <= w[1].group_order)
        );
    }

    #[test]
    fn hello_needs_no_input() {
        let registry = LessonRegistry::builtin().unwrap();
        assert!(!registry.descriptor("hello workshop").unwrap().needs_input);
        assert!(registry.descriptor("Echo").unwrap().needs_input);
    }

    #[tokio::test]
    async fn echo_processes_input() {
        let out = Echo::new().run("hi").await.unwrap();
        assert_eq!(out, "Processed: hi");
    }

    #[test]
    fn text_stats_counts() {
        let stats = TextStats::of("The cat saw the other cat!");
        assert_eq!(stats.words, 6);
        assert_eq!(stats.unique_words, 4);
        assert_eq!(stats.vowels, 7);
    }

    #[tokio::test]
    async fn sentence_stats_rejects_blank_input() {
        let err = SentenceStats::new().run("   ").await.unwrap_err();
        assert!(err.to_string().contains("empty sentence"));
    }

    #[tokio::test]
    async fn exercise_placeholder_mentions_input() {
        let lesson = Exercise::new(4, GroupOrder::new(3, 4), "x", "y");
        assert_eq!(lesson.descriptor().display_name, "EXERCISE 4");
        let out = lesson.run("draft").await.unwrap();
        assert_eq!(out, "Exercise 4 placeholder. Input: draft");
    }
}
