use dialoguer::{Confirm, Input, Password, Select};

use crate::error::InstallerError;

/// Everything the installer asks the operator goes through this trait.
pub trait Prompter {
    /// Free-form line of text. May be empty.
    fn input(&mut self, prompt: &str) -> Result<String, InstallerError>;

    /// Hidden input. May be empty.
    fn password(&mut self, prompt: &str) -> Result<String, InstallerError>;

    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool, InstallerError>;

    /// Returns the index of the chosen item.
    fn select(&mut self, prompt: &str, items: &[String]) -> Result<usize, InstallerError>;

    /// Blocks until the operator presses Enter.
    fn pause(&mut self, prompt: &str) -> Result<(), InstallerError> {
        self.input(prompt).map(|_| ())
    }
}

/// Interactive terminal prompts backed by `dialoguer`.
#[derive(Debug, Default)]
pub struct TermPrompter;

impl Prompter for TermPrompter {
    fn input(&mut self, prompt: &str) -> Result<String, InstallerError> {
        let value: String = Input::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()?;
        Ok(value)
    }

    fn password(&mut self, prompt: &str) -> Result<String, InstallerError> {
        Ok(Password::new()
            .with_prompt(prompt)
            .allow_empty_password(true)
            .interact()?)
    }

    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool, InstallerError> {
        Ok(Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()?)
    }

    fn select(&mut self, prompt: &str, items: &[String]) -> Result<usize, InstallerError> {
        Ok(Select::new()
            .with_prompt(prompt)
            .items(items)
            .default(0)
            .interact()?)
    }
}
