//! Terminal implementation of [`InteractionService`].
//!
//! Prompts go to stdout and answers are read line by line from stdin.
//! End of input cancels any prompt. A blank answer or `q` cancels a choice.

use std::io::{self, IsTerminal, Write};

use anyhow::{Context, Result};
use async_trait::async_trait;
use crossterm::style::{StyledContent, Stylize};

use lessonhost_core::interaction::{
    ChoiceOption, ChoicePrompt, Intent, InteractionService, MessageBox, Notice, Prompt, TextPrompt,
};

/// Interaction surface backed by the controlling terminal.
#[derive(Debug, Default)]
pub struct ConsoleInteraction;

impl ConsoleInteraction {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl InteractionService for ConsoleInteraction {
    fn is_available(&self) -> bool {
        io::stdin().is_terminal()
    }

    async fn prompt_choice(&self, prompt: &ChoicePrompt) -> Result<Prompt<String>> {
        println!("\n{}", prompt.title.as_str().bold());
        println!("{}", prompt.message);
        for (i, option) in prompt.options.iter().enumerate() {
            println!("  {} {}", format!("[{}]", i + 1).cyan(), option.label);
        }

        loop {
            let Some(line) = read_answer("Choice (number or name, q to cancel)").await? else {
                return Ok(Prompt::Cancelled);
            };
            match resolve_choice(&line, &prompt.options) {
                ChoiceInput::Cancel => return Ok(Prompt::Cancelled),
                ChoiceInput::Pick(value) => return Ok(Prompt::Answered(value)),
                ChoiceInput::Invalid => {
                    println!("{}", format!("No option matches {:?}.", line.trim()).yellow());
                }
            }
        }
    }

    async fn prompt_text(&self, prompt: &TextPrompt) -> Result<Prompt<String>> {
        println!("\n{}", prompt.title.as_str().bold());
        println!("{}", prompt.message);
        if let Some(placeholder) = &prompt.placeholder {
            println!("{}", placeholder.as_str().dim());
        }
        match read_answer(&prompt.label).await? {
            Some(line) => Ok(Prompt::Answered(line.trim_end_matches(['\r', '\n']).to_string())),
            None => Ok(Prompt::Cancelled),
        }
    }

    async fn message_box(&self, message: &MessageBox) -> Result<()> {
        println!("\n{}", styled(&message.title, message.intent).bold());
        println!("{}", message.message);
        // Only wait for acknowledgement when someone is there to give it.
        if self.is_available() {
            read_answer(&format!("[{}]", message.button)).await?;
        }
        Ok(())
    }

    async fn notify(&self, notice: &Notice) -> Result<()> {
        println!(
            "{} {}",
            styled(&format!("{}:", notice.title), notice.intent),
            notice.message
        );
        Ok(())
    }
}

fn styled(text: &str, intent: Intent) -> StyledContent<&str> {
    match intent {
        Intent::Success => text.green(),
        Intent::Information => text.blue(),
        Intent::Warning => text.yellow(),
        Intent::Error => text.red(),
    }
}

/// Print `label` and read one line. `None` on end of input.
async fn read_answer(label: &str) -> Result<Option<String>> {
    print!("{} ", format!("{label}:").cyan());
    io::stdout().flush().context("failed to flush stdout")?;

    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        let read = io::stdin().read_line(&mut line)?;
        Ok::<_, io::Error>((read > 0).then_some(line))
    })
    .await
    .context("stdin reader task failed")?
    .context("failed to read from stdin")
}

#[derive(Debug, PartialEq, Eq)]
enum ChoiceInput {
    Cancel,
    Pick(String),
    Invalid,
}

/// Interpret a typed answer to a choice prompt: a 1-based index, an option
/// value or an option label, compared case-insensitively.
fn resolve_choice(input: &str, options: &[ChoiceOption]) -> ChoiceInput {
    let input = input.trim();
    if input.is_empty() || input.eq_ignore_ascii_case("q") {
        return ChoiceInput::Cancel;
    }
    if let Ok(n) = input.parse::<usize>() {
        return match n.checked_sub(1).and_then(|i| options.get(i)) {
            Some(option) => ChoiceInput::Pick(option.value.clone()),
            None => ChoiceInput::Invalid,
        };
    }
    options
        .iter()
        .find(|o| o.value.eq_ignore_ascii_case(input) || o.label.eq_ignore_ascii_case(input))
        .map_or(ChoiceInput::Invalid, |o| ChoiceInput::Pick(o.value.clone()))
}
