use anyhow::{Context, Result};
use std::collections::HashMap;
use std::env as stdenv;
use std::path::{Path, PathBuf};

/// Value of the variables that identify the shell to its children.
pub const SHELL_IDENTITY: &str = "- SHSH";

/// Variables set to [`SHELL_IDENTITY`] at startup.
pub const IDENTITY_VARS: [&str; 2] = ["0", "SHELL"];

/// Publishes the shell identity variables in the process environment so every
/// child process inherits them.
///
/// # Safety
///
/// Modifies the process environment. Must be called while the process is still
/// single-threaded, before anything else reads or writes environment variables.
pub unsafe fn export_shell_identity() {
    for key in IDENTITY_VARS {
        // SAFETY: upheld by the caller.
        unsafe { stdenv::set_var(key, SHELL_IDENTITY) };
    }
}

/// User-level view of the process environment used by the interpreter.
///
/// Variable lookups see a snapshot of the process environment taken at
/// construction plus any overrides set through [`Environment::set_var`].
/// Directory operations go straight to the operating system, because child
/// processes inherit the real working directory.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    /// Key-value store of environment variables (e.g., PATH, HOME).
    pub vars: HashMap<String, String>,
}

impl Environment {
    /// Capture the current process variables into a new `Environment` instance.
    pub fn new() -> Self {
        Self {
            vars: stdenv::vars().collect(),
        }
    }

    /// Get the value of an environment variable.
    ///
    /// Looks up the key in `self.vars` first, falling back to `std::env::var`.
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .cloned()
            .or_else(|| stdenv::var(key).ok())
    }

    /// Set or override a variable visible to built-ins.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// The process working directory.
    pub fn current_dir(&self) -> Result<PathBuf> {
        stdenv::current_dir().context("cannot determine current directory")
    }

    /// Changes the process working directory.
    pub fn change_dir(&mut self, target: &Path) -> Result<()> {
        stdenv::set_current_dir(target).with_context(|| format!("cd: {}", target.display()))
    }
}
