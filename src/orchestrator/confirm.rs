//! ConfirmationPort - how the orchestrator talks to a human

use crate::core::{WalletError, WalletResult};
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

pub trait ConfirmationPort {
    /// Show a message that needs no answer
    fn notify(&mut self, message: &str);

    /// Show `message` and return the typed line without its line ending
    fn prompt(&mut self, message: &str) -> WalletResult<String>;
}

/// Terminal port. Messages go to stderr so stdout stays machine readable.
#[derive(Debug, Default)]
pub struct StdioPort;

impl ConfirmationPort for StdioPort {
    fn notify(&mut self, message: &str) {
        eprintln!("{}", message);
    }

    fn prompt(&mut self, message: &str) -> WalletResult<String> {
        let mut stderr = io::stderr();
        write!(stderr, "{}", message).map_err(|e| WalletError::Aborted(e.to_string()))?;
        stderr.flush().map_err(|e| WalletError::Aborted(e.to_string()))?;

        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| WalletError::Aborted(e.to_string()))?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Replays canned answers and records what was asked
#[derive(Debug, Default)]
pub struct ScriptedPort {
    answers: VecDeque<String>,
    pub prompts: Vec<String>,
    pub notices: Vec<String>,
}

impl ScriptedPort {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { answers: answers.into_iter().map(Into::into).collect(), ..Default::default() }
    }
}

impl ConfirmationPort for ScriptedPort {
    fn notify(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }

    fn prompt(&mut self, message: &str) -> WalletResult<String> {
        self.prompts.push(message.to_string());
        self.answers
            .pop_front()
            .ok_or_else(|| WalletError::Aborted("no answer available".into()))
    }
}
