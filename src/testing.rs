//! Test doubles for the operator and the operating system.

use std::{
    collections::{HashMap, VecDeque},
    io,
    path::{Path, PathBuf},
};

use crate::{
    cmd::{RunOutput, Runner},
    error::InstallerError,
    prompt::Prompter,
};

/// One scripted operator answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Yes,
    No,
    Choice(usize),
}

impl Reply {
    pub fn text(s: impl Into<String>) -> Self {
        Reply::Text(s.into())
    }
}

/// Answers prompts from a fixed script.
///
/// Running out of answers, or meeting an answer of the wrong kind, yields
/// [`InstallerError::Cancelled`] so a reprompt loop cannot spin forever.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    replies: VecDeque<Reply>,
    pub prompts: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: replies.into_iter().collect(),
            prompts: Vec::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.replies.len()
    }

    fn next(&mut self, prompt: &str) -> Result<Reply, InstallerError> {
        self.prompts.push(prompt.to_string());
        self.replies.pop_front().ok_or(InstallerError::Cancelled)
    }
}

impl Prompter for ScriptedPrompter {
    fn input(&mut self, prompt: &str) -> Result<String, InstallerError> {
        match self.next(prompt)? {
            Reply::Text(s) => Ok(s),
            _ => Err(InstallerError::Cancelled),
        }
    }

    fn password(&mut self, prompt: &str) -> Result<String, InstallerError> {
        self.input(prompt)
    }

    fn confirm(&mut self, prompt: &str, _default: bool) -> Result<bool, InstallerError> {
        match self.next(prompt)? {
            Reply::Yes => Ok(true),
            Reply::No => Ok(false),
            _ => Err(InstallerError::Cancelled),
        }
    }

    fn select(&mut self, prompt: &str, items: &[String]) -> Result<usize, InstallerError> {
        match self.next(prompt)? {
            Reply::Choice(i) if i < items.len() => Ok(i),
            _ => Err(InstallerError::Cancelled),
        }
    }
}

/// Records every request and reports success unless told otherwise.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    pub commands: Vec<Vec<String>>,
    pub stdin: Vec<Option<String>>,
    pub writes: Vec<(PathBuf, String)>,
    pub detached: Vec<Vec<String>>,
    failures: HashMap<String, i32>,
    outputs: HashMap<String, String>,
}

impl RecordingRunner {
    /// Any command mentioning `program` exits with `code`.
    pub fn failing(mut self, program: &str, code: i32) -> Self {
        self.failures.insert(program.to_string(), code);
        self
    }

    /// Any command mentioning `program` prints `stdout`.
    pub fn with_output(mut self, program: &str, stdout: &str) -> Self {
        self.outputs.insert(program.to_string(), stdout.to_string());
        self
    }
}

impl Runner for RecordingRunner {
    fn run(
        &mut self,
        argv: &[String],
        stdin: Option<&str>,
        _capture: bool,
    ) -> io::Result<RunOutput> {
        self.commands.push(argv.to_vec());
        self.stdin.push(stdin.map(str::to_string));

        let code = argv
            .iter()
            .find_map(|a| self.failures.get(a).copied())
            .unwrap_or(0);
        let stdout = argv
            .iter()
            .find_map(|a| self.outputs.get(a).cloned())
            .unwrap_or_default();

        Ok(RunOutput {
            code: Some(code),
            stdout,
            stderr: String::new(),
        })
    }

    fn write_file(
        &mut self,
        path: &Path,
        contents: &str,
        _append: bool,
        _private: bool,
    ) -> io::Result<()> {
        self.writes.push((path.to_path_buf(), contents.to_string()));
        Ok(())
    }

    fn spawn_detached(&mut self, argv: &[String]) {
        self.detached.push(argv.to_vec());
    }
}
