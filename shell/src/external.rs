use crate::command::ExitCode;
use crate::env::Environment;
use log::debug;
use nix::errno::Errno;
use nix::sys::signal::{SigHandler, Signal, signal};
use nix::unistd::execv;
use std::borrow::Cow;
use std::ffi::{CString, OsStr};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use thiserror::Error;

/// Status reported when a program cannot be found or executed.
pub const EXIT_NOT_FOUND: ExitCode = 127;

/// Search path used when `PATH` is unset, matching what `execvp` falls back to.
const DEFAULT_SEARCH_PATH: &str = "/bin:/usr/bin";

/// Errors raised while starting an external program or preparing a stage.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("{name}: command not found")]
    NotFound { name: String },
    #[error("{name}: {source}")]
    Exec { name: String, source: Errno },
    #[error("{name}: {source}")]
    Spawn { name: String, source: io::Error },
    #[error("{0:#}")]
    Setup(anyhow::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl LaunchError {
    /// Exit status a process reports for this failure.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            LaunchError::NotFound { .. } | LaunchError::Exec { .. } | LaunchError::Spawn { .. } => {
                EXIT_NOT_FOUND
            }
            LaunchError::Setup(_) | LaunchError::Io(_) => 1,
        }
    }
}

/// Command that is not a builtin.
#[derive(Debug)]
pub struct ExternalCommand {
    /// The name as typed, passed to the program as `argv[0]`.
    name: String,
    /// Resolved location of the executable.
    program: PathBuf,
    args: Vec<String>,
}

impl ExternalCommand {
    /// Resolves `argv[0]` against the `PATH` of `env`.
    pub fn resolve(env: &Environment, argv: &[String]) -> Result<Self, LaunchError> {
        let (name, args) = argv.split_first().ok_or_else(|| LaunchError::NotFound {
            name: String::new(),
        })?;
        let search_paths = env
            .get_var("PATH")
            .unwrap_or_else(|| DEFAULT_SEARCH_PATH.to_string());
        let program = find_command_path(OsStr::new(&search_paths), Path::new(name))
            .ok_or_else(|| LaunchError::NotFound { name: name.clone() })?
            .into_owned();
        Ok(Self {
            name: name.clone(),
            program,
            args: args.to_vec(),
        })
    }

    #[cfg(test)]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Starts the program as a new process that inherits the standard streams
    /// and environment, and blocks until it terminates.
    pub fn spawn_and_wait(&self) -> Result<ExitCode, LaunchError> {
        let mut child = Command::new(&self.program)
            .arg0(&self.name)
            .args(&self.args)
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                name: self.name.clone(),
                source,
            })?;
        debug!("spawned {} as pid {}", self.program.display(), child.id());
        let exit_status = child.wait()?;
        debug!("pid {} finished with {}", child.id(), exit_status);
        match exit_status.code() {
            Some(x) => Ok(x),
            None => Ok(terminated_by_signal(exit_status)),
        }
    }

    /// Replaces the current process image with the program.
    ///
    /// Only returns if the replacement failed.
    pub fn exec(self) -> LaunchError {
        let exec_error = |source| LaunchError::Exec {
            name: self.name.clone(),
            source,
        };
        let program = match CString::new(self.program.as_os_str().as_bytes()) {
            Ok(p) => p,
            Err(_) => return exec_error(Errno::EINVAL),
        };
        let argv: Result<Vec<CString>, _> = std::iter::once(&self.name)
            .chain(&self.args)
            .map(|arg| CString::new(arg.as_bytes()))
            .collect();
        let argv = match argv {
            Ok(argv) => argv,
            Err(_) => return exec_error(Errno::EINVAL),
        };
        // The Rust runtime ignores SIGPIPE and exec keeps ignored signals
        // ignored; programs expect to die on a closed pipe.
        // SAFETY: no handler is installed, only the default restored.
        if let Err(errno) = unsafe { signal(Signal::SIGPIPE, SigHandler::SigDfl) } {
            debug!("cannot restore SIGPIPE: {}", errno);
        }
        match execv(&program, &argv) {
            Ok(never) => match never {},
            Err(errno) => exec_error(errno),
        }
    }
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

/// Resolve a command path the way a typical shell would.
///
/// Behavior:
/// - Absolute path: returns it if it names a file.
/// - Relative with multiple components (e.g., `bin/sh`): returns it if it names a file.
/// - `./foo`: returns it if it names a file.
/// - Single path component (no separators): search each directory in `search_paths` (PATH)
///   and return the first match.
/// - Empty path: returns `None`.
///
/// Returns either a borrowed reference to the provided `path` or an owned `PathBuf`
/// when the result is discovered via PATH lookup.
pub fn find_command_path<'a>(search_paths: &OsStr, path: &'a Path) -> Option<Cow<'a, Path>> {
    if path.is_absolute() {
        return find_by_path(path).map(Cow::Borrowed);
    }

    if path.starts_with("./") && path.is_file() {
        return Some(Cow::Borrowed(path));
    }

    let mut components = path.components();
    let first = components.next();
    let second = components.next();
    match (first, second) {
        (None, None) => {
            // Empty path -> not found
            None
        }
        (Some(x), None) => {
            // Single component -> search in PATH
            find_in_path(search_paths, x.as_os_str()).map(Cow::Owned)
        }
        _ => {
            // Multiple components -> search in current dir
            find_by_path(path).map(Cow::Borrowed)
        }
    }
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    for dir in std::env::split_paths(search_paths) {
        let path = dir.join(cmd);
        if let Some(path) = find_by_path(&path) {
            return Some(path.to_owned());
        }
    }
    None
}

fn find_by_path(path: &Path) -> Option<&Path> {
    if path.is_file() { Some(path) } else { None }
}
