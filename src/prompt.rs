use anyhow::Result;
use inquire::{Confirm, Text};
use std::cell::RefCell;
use std::collections::VecDeque;

/// Trait for the interactive prompts the cleanup flow depends on.
/// This allows us to abstract away the terminal interaction for testing.
pub trait PromptProvider {
    /// Ask the user for a line of free-form input
    ///
    /// # Errors
    /// Returns an error if the prompt fails or the user cancels
    fn input(&self, message: &str) -> Result<String>;

    /// Ask the user a yes/no question (defaulting to no)
    ///
    /// # Errors
    /// Returns an error if the prompt fails or the user cancels
    fn confirm(&self, message: &str) -> Result<bool>;
}

/// Real implementation using inquire for production use
pub struct RealPromptProvider;

impl PromptProvider for RealPromptProvider {
    fn input(&self, message: &str) -> Result<String> {
        let answer = Text::new(message).prompt()?;
        Ok(answer)
    }

    fn confirm(&self, message: &str) -> Result<bool> {
        let answer = Confirm::new(message).with_default(false).prompt()?;
        Ok(answer)
    }
}

/// Mock implementation for testing that replays scripted answers.
///
/// Answers are consumed in order; the cleanup flow may ask several questions
/// per run, so both queues hold a sequence.
pub struct MockPromptProvider {
    inputs: RefCell<VecDeque<String>>,
    confirmations: RefCell<VecDeque<bool>>,
}

impl MockPromptProvider {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inputs: RefCell::new(VecDeque::new()),
            confirmations: RefCell::new(VecDeque::new()),
        }
    }

    #[must_use]
    pub fn with_input(self, answer: impl Into<String>) -> Self {
        self.inputs.borrow_mut().push_back(answer.into());
        self
    }

    #[must_use]
    pub fn with_confirmation(self, answer: bool) -> Self {
        self.confirmations.borrow_mut().push_back(answer);
        self
    }
}

impl Default for MockPromptProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptProvider for MockPromptProvider {
    fn input(&self, _message: &str) -> Result<String> {
        self.inputs
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("Mock prompt ran out of scripted inputs"))
    }

    fn confirm(&self, _message: &str) -> Result<bool> {
        self.confirmations
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("Mock prompt ran out of scripted confirmations"))
    }
}
