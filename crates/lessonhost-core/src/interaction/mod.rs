//! The `InteractionService` trait -- the surface the control plane talks to
//! the user through.
//!
//! The trait is object-safe so the flow can hold `&dyn InteractionService`
//! and tests can substitute a scripted implementation.

use anyhow::Result;
use async_trait::async_trait;

/// Visual styling of a message or notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Success,
    Information,
    Warning,
    Error,
}

/// Answer to a prompt: either a value, or the user backed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt<T> {
    Answered(T),
    Cancelled,
}

impl<T> Prompt<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Prompt<U> {
        match self {
            Self::Answered(v) => Prompt::Answered(f(v)),
            Self::Cancelled => Prompt::Cancelled,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// One selectable entry of a [`ChoicePrompt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceOption {
    /// Value returned when this option is picked.
    pub value: String,
    /// Text shown to the user.
    pub label: String,
}

/// Pick one value out of a list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoicePrompt {
    pub title: String,
    pub message: String,
    pub options: Vec<ChoiceOption>,
}

/// Free-text input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPrompt {
    pub title: String,
    pub message: String,
    /// Label of the input field.
    pub label: String,
    pub placeholder: Option<String>,
}

/// A blocking dialog the user acknowledges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBox {
    pub title: String,
    pub message: String,
    pub intent: Intent,
    /// Whether `message` may be rendered as markdown.
    pub markdown: bool,
    pub button: String,
}

/// A non-blocking notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub message: String,
    pub intent: Intent,
}

/// Prompt, message box and notification operations.
///
/// Errors from any method are the surface failing, not the user declining;
/// declining is [`Prompt::Cancelled`].
#[async_trait]
pub trait InteractionService: Send + Sync {
    /// Whether the surface can currently reach the user.
    fn is_available(&self) -> bool;

    async fn prompt_choice(&self, prompt: &ChoicePrompt) -> Result<Prompt<String>>;

    async fn prompt_text(&self, prompt: &TextPrompt) -> Result<Prompt<String>>;

    async fn message_box(&self, message: &MessageBox) -> Result<()>;

    async fn notify(&self, notice: &Notice) -> Result<()>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn InteractionService) {}
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_map_keeps_cancellation() {
        assert_eq!(Prompt::Answered(2).map(|n| n * 2), Prompt::Answered(4));
        let cancelled: Prompt<i32> = Prompt::Cancelled;
        assert!(cancelled.map(|n| n * 2).is_cancelled());
    }
}
