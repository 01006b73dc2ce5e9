//! Operator interaction seam.

use anyhow::{Context, Result};
use dialoguer::{Confirm, Input};

#[cfg(test)]
use mockall::automock;

/// Asks the operator questions. Production uses the terminal; tests and
/// `--answers` runs never reach it.
#[cfg_attr(test, automock)]
pub trait Prompter {
    /// Yes/no question.
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool>;

    /// Free-text question. An empty `default` means none.
    fn input(&self, prompt: &str, default: &str) -> Result<String>;
}

/// Terminal prompts via dialoguer.
#[derive(Debug, Default, Clone, Copy)]
pub struct DialoguerPrompter;

impl Prompter for DialoguerPrompter {
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()
            .context("Failed to read confirmation input")
    }

    fn input(&self, prompt: &str, default: &str) -> Result<String> {
        let mut input = Input::<String>::new().with_prompt(prompt).allow_empty(true);
        if !default.is_empty() {
            input = input.default(default.to_string());
        }
        input
            .interact_text()
            .map(|s| s.trim().to_string())
            .context("Failed to read input")
    }
}
