//! Confirmation gate for destructive operations.
//!
//! Dropping a table, emptying a table and dropping a database all pass
//! through a [`Guard`] first. A declined confirmation is a normal outcome:
//! nothing runs and nothing is reported as an error.

use std::collections::VecDeque;
use std::io::{self, Write};
use tracing::{debug, warn};

/// Default affirmative answer.
pub const DEFAULT_AFFIRMATIVE: &str = "y";

/// Asks the operator to confirm. Anything but an explicit yes is a no.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Whether `answer` is exactly the affirmative token, ignoring case and
/// surrounding whitespace.
pub fn is_affirmative(answer: &str, token: &str) -> bool {
    answer.trim().to_lowercase() == token.trim().to_lowercase()
}

/// Prompts on stdout and reads one line from stdin.
#[derive(Debug, Clone)]
pub struct StdinConfirm {
    token: String,
}

impl StdinConfirm {
    pub fn new(token: &str) -> Self {
        StdinConfirm {
            token: token.to_string(),
        }
    }
}

impl Default for StdinConfirm {
    fn default() -> Self {
        StdinConfirm::new(DEFAULT_AFFIRMATIVE)
    }
}

impl Confirm for StdinConfirm {
    fn confirm(&mut self, prompt: &str) -> bool {
        print!("{} ({}/N) ", prompt, self.token);
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        match io::stdin().read_line(&mut answer) {
            Ok(_) => is_affirmative(&answer, &self.token),
            Err(e) => {
                warn!("Could not read confirmation: {}", e);
                false
            }
        }
    }
}

/// Replays fixed answers and records the prompts it was shown.
/// Runs out as "no".
#[derive(Debug, Clone, Default)]
pub struct ScriptedConfirm {
    answers: VecDeque<bool>,
    pub prompts: Vec<String>,
}

impl ScriptedConfirm {
    pub fn new(answers: &[bool]) -> Self {
        ScriptedConfirm {
            answers: answers.iter().copied().collect(),
            prompts: Vec::new(),
        }
    }
}

impl Confirm for ScriptedConfirm {
    fn confirm(&mut self, prompt: &str) -> bool {
        self.prompts.push(prompt.to_string());
        self.answers.pop_front().unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    AwaitingConfirmation,
    Confirmed,
    Aborted,
}

/// Holds the confirmation capability and the state of the last check.
#[derive(Debug)]
pub struct Guard<C> {
    confirmer: C,
    state: GuardState,
}

impl<C: Confirm> Guard<C> {
    pub fn new(confirmer: C) -> Self {
        Guard {
            confirmer,
            state: GuardState::AwaitingConfirmation,
        }
    }

    /// Runs one confirmation. `force` confirms without prompting.
    pub fn check(&mut self, prompt: &str, force: bool) -> GuardState {
        self.state = GuardState::AwaitingConfirmation;
        self.state = if force || self.confirmer.confirm(prompt) {
            GuardState::Confirmed
        } else {
            GuardState::Aborted
        };

        debug!("{:?} (forced: {}): {}", self.state, force, prompt);
        self.state
    }

    /// State left by the last check
    pub fn state(&self) -> GuardState {
        self.state
    }

    pub fn confirmer(&self) -> &C {
        &self.confirmer
    }
}
