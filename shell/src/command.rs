use crate::env::Environment;
use std::io::{BufRead, Write};

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// What the interactive loop should do after a command finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// Read the next line.
    Continue,
    /// Leave the loop and end the shell.
    Terminate,
}

impl Continuation {
    pub fn keep_running(self) -> bool {
        matches!(self, Continuation::Continue)
    }
}

/// Object-safe trait for any command the shell runs inside its own process.
///
/// This is implemented by built-ins via a blanket impl. Errors never escape:
/// an implementation reports them on `stderr` and keeps the shell running.
pub trait ExecutableCommand {
    /// Executes the command.
    fn execute(
        self: Box<Self>,
        stdin: &mut dyn BufRead,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Continuation;
}

/// Factory that tries to create a command from a name and its arguments.
///
/// Returns `None` when the factory doesn't recognize the `name`.
pub trait CommandFactory {
    /// The name this factory answers to.
    fn name(&self) -> &'static str;

    /// Attempt to create a command instance for the provided name and arguments.
    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_continuation_keep_running() {
        assert!(Continuation::Continue.keep_running());
        assert!(!Continuation::Terminate.keep_running());
    }
}
