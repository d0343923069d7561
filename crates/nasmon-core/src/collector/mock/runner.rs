//! Canned command output for testing collectors without the real tools.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

use crate::collector::error::ExecError;
use crate::collector::traits::CommandRunner;

#[derive(Debug, Clone)]
enum Reply {
    Stdout(String),
    Failure { code: Option<i32>, stderr: String },
}

#[derive(Debug, Default)]
struct State {
    replies: HashMap<String, Reply>,
    programs: HashSet<String>,
    calls: Vec<String>,
}

/// [`CommandRunner`] that answers from a table keyed by the full command line.
///
/// The key is the program followed by its arguments joined with single
/// spaces, e.g. `"virsh domstate Windows 11"`. Commands without a registered
/// reply fail with exit code 127. A program counts as installed once any
/// reply for it was registered, until [`remove_program`](Self::remove_program).
#[derive(Debug, Default)]
pub struct MockRunner {
    state: Mutex<State>,
}

fn command_line(program: &str, args: &[&str]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

fn program_of(line: &str) -> &str {
    line.split(' ').next().unwrap_or(line)
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers stdout for a command line.
    pub fn set_output(&self, line: &str, stdout: impl Into<String>) {
        let mut state = self.state();
        state.programs.insert(program_of(line).to_string());
        state
            .replies
            .insert(line.to_string(), Reply::Stdout(stdout.into()));
    }

    /// Registers a non-zero exit for a command line.
    pub fn set_failure(&self, line: &str, code: i32, stderr: &str) {
        let mut state = self.state();
        state.programs.insert(program_of(line).to_string());
        state.replies.insert(
            line.to_string(),
            Reply::Failure {
                code: Some(code),
                stderr: stderr.to_string(),
            },
        );
    }

    /// Makes `program` look uninstalled. Registered replies stay in the table.
    pub fn remove_program(&self, program: &str) {
        self.state().programs.remove(program);
    }

    /// Every command line run so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    /// Number of runs of `program`, any arguments.
    pub fn call_count(&self, program: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| program_of(c) == program)
            .count()
    }
}

impl CommandRunner for MockRunner {
    fn output(&self, program: &str, args: &[&str]) -> Result<String, ExecError> {
        let line = command_line(program, args);
        let mut state = self.state();
        state.calls.push(line.clone());

        match state.replies.get(&line) {
            Some(Reply::Stdout(out)) => Ok(out.clone()),
            Some(Reply::Failure { code, stderr }) => Err(ExecError::Failed {
                program: program.to_string(),
                code: *code,
                stderr: stderr.clone(),
            }),
            None => Err(ExecError::Failed {
                program: program.to_string(),
                code: Some(127),
                stderr: format!("no mock reply for `{line}`"),
            }),
        }
    }

    fn exists(&self, program: &str) -> bool {
        self.state().programs.contains(program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_output_and_call_log() {
        let runner = MockRunner::new();
        runner.set_output("virsh list --all --name", "vm1\nvm2\n");

        assert!(runner.exists("virsh"));
        assert!(!runner.exists("docker"));
        assert_eq!(
            runner.output("virsh", &["list", "--all", "--name"]).unwrap(),
            "vm1\nvm2\n"
        );
        assert_eq!(runner.calls(), vec!["virsh list --all --name"]);
        assert_eq!(runner.call_count("virsh"), 1);
    }

    #[test]
    fn test_failure_and_unregistered() {
        let runner = MockRunner::new();
        runner.set_failure("zpool list", 1, "no pools available");

        match runner.output("zpool", &["list"]) {
            Err(ExecError::Failed { code, stderr, .. }) => {
                assert_eq!(code, Some(1));
                assert_eq!(stderr, "no pools available");
            }
            other => panic!("unexpected result: {:?}", other),
        }

        match runner.output("zpool", &["status"]) {
            Err(ExecError::Failed { code, .. }) => assert_eq!(code, Some(127)),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_remove_program() {
        let runner = MockRunner::new();
        runner.set_output("docker ps", "");
        runner.remove_program("docker");
        assert!(!runner.exists("docker"));
    }
}
