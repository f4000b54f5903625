//! Discrete operator commands and where they come from.

use std::collections::VecDeque;
use std::io::BufRead;

use log::warn;

/// Operator command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Look up both pose chains and store the pair.
    Capture,
    /// Drop the most recent pair.
    Undo,
    /// Solve, write the result and end the session.
    Finalize,
    /// Anything else; echoed and ignored.
    Unknown(char),
}

impl Command {
    pub fn from_char(c: char) -> Self {
        match c.to_ascii_lowercase() {
            's' => Command::Capture,
            'd' => Command::Undo,
            'q' => Command::Finalize,
            _ => Command::Unknown(c),
        }
    }
}

/// Pulls commands one at a time. `None` means the input is exhausted.
pub trait CommandSource {
    fn next_command(&mut self) -> Option<Command>;
}

/// A fixed queue of commands, for scripted sessions and tests.
#[derive(Debug, Clone, Default)]
pub struct ScriptedCommands {
    queue: VecDeque<Command>,
}

impl ScriptedCommands {
    /// One command per non-whitespace character, e.g. `"sssdq"`.
    pub fn parse(script: &str) -> Self {
        script
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(Command::from_char)
            .collect()
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl FromIterator<Command> for ScriptedCommands {
    fn from_iter<I: IntoIterator<Item = Command>>(iter: I) -> Self {
        Self {
            queue: iter.into_iter().collect(),
        }
    }
}

impl CommandSource for ScriptedCommands {
    fn next_command(&mut self) -> Option<Command> {
        self.queue.pop_front()
    }
}

/// Line-oriented commands from a terminal or any other reader.
///
/// Every non-whitespace character of a line is one command.
#[derive(Debug)]
pub struct ReaderCommands<R> {
    reader: R,
    pending: VecDeque<Command>,
    line: String,
}

impl<R: BufRead> ReaderCommands<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            pending: VecDeque::new(),
            line: String::new(),
        }
    }
}

impl<R: BufRead> CommandSource for ReaderCommands<R> {
    fn next_command(&mut self) -> Option<Command> {
        while self.pending.is_empty() {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => return None,
                Ok(_) => self.pending.extend(
                    self.line
                        .chars()
                        .filter(|c| !c.is_whitespace())
                        .map(Command::from_char),
                ),
                Err(e) => {
                    warn!("failed to read command input: {e}");
                    return None;
                }
            }
        }
        self.pending.pop_front()
    }
}
