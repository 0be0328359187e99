use crate::builtin::Registry;
use crate::command::{Continuation, ExitCode};
use crate::env::Environment;
use crate::external::{ExternalCommand, LaunchError};
use crate::parser::Stage;
use crate::redirect::{ChannelTable, RedirectionPlan};
use log::debug;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::os::fd::AsFd;

/// Decides, for one stage, between a built-in and an external program.
pub struct Dispatcher<'a> {
    registry: &'a Registry,
}

impl<'a> Dispatcher<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Runs `stage` in the calling process.
    ///
    /// A built-in runs synchronously on the given streams and its continuation
    /// signal is returned. Anything else replaces the current process image,
    /// so this only returns for an external program when it could not be
    /// started. An empty stage is a no-op.
    pub fn dispatch(
        &self,
        stage: &Stage,
        stdin: &mut dyn BufRead,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<Continuation, LaunchError> {
        let Some(name) = stage.name() else {
            return Ok(Continuation::Continue);
        };
        let args: Vec<&str> = stage.args().iter().map(String::as_str).collect();
        if let Some(cmd) = self.registry.try_create(name, &args) {
            return Ok(cmd.execute(stdin, stdout, stderr, env));
        }
        let external = ExternalCommand::resolve(env, stage.argv())?;
        Err(external.exec())
    }

    /// Body of a forked pipeline stage: applies `plan`, dispatches the stage
    /// and terminates the process. Never returns to the caller.
    pub fn run_in_child(
        &self,
        stage: &Stage,
        plan: RedirectionPlan,
        channels: ChannelTable,
        env: &mut Environment,
    ) -> ! {
        let result = self.child_main(stage, plan, channels, env);
        if let Err(e) = &result {
            let _ = writeln!(io::stderr(), "shsh: {e}");
        }
        std::process::exit(child_exit_code(&result))
    }

    fn child_main(
        &self,
        stage: &Stage,
        plan: RedirectionPlan,
        channels: ChannelTable,
        env: &mut Environment,
    ) -> Result<Continuation, LaunchError> {
        plan.apply(channels).map_err(LaunchError::Setup)?;
        debug!("stage {:?} running in pid {}", stage.name(), std::process::id());

        // Bytes the shell's own reader buffered must not leak into a stage fed
        // by a channel, so such a stage reads descriptor 0 directly.
        let mut inherited;
        let mut redirected;
        let stdin: &mut dyn BufRead = if plan.redirects_stdin() {
            redirected = BufReader::new(File::from(io::stdin().as_fd().try_clone_to_owned()?));
            &mut redirected
        } else {
            inherited = io::stdin().lock();
            &mut inherited
        };

        let mut stdout = io::stdout().lock();
        let continuation = self.dispatch(stage, stdin, &mut stdout, &mut io::stderr(), env)?;
        stdout.flush()?;
        Ok(continuation)
    }
}

/// Exit status a forked stage reports for its result.
///
/// The continuation of a piped built-in cannot reach the interactive loop, so
/// both signals map to success.
pub fn child_exit_code(result: &Result<Continuation, LaunchError>) -> ExitCode {
    match result {
        Ok(_) => 0,
        Err(e) => e.exit_code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn stage(argv: &[&str]) -> Stage {
        Stage::new(argv.iter().map(|s| s.to_string()).collect())
    }

    fn dispatch(
        argv: &[&str],
        env: &mut Environment,
    ) -> (Result<Continuation, LaunchError>, String, String) {
        let registry = Registry::default();
        let dispatcher = Dispatcher::new(&registry);
        let mut out = Vec::new();
        let mut err = Vec::new();
        let result = dispatcher.dispatch(
            &stage(argv),
            &mut Cursor::new(Vec::new()),
            &mut out,
            &mut err,
            env,
        );
        (
            result,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn test_builtin_runs_in_process() {
        let (result, out, err) = dispatch(&["echo", "a", "b"], &mut Environment::default());
        assert_eq!(result.unwrap(), Continuation::Continue);
        assert_eq!(out, "a b\n");
        assert!(err.is_empty());
    }

    #[test]
    fn test_builtin_continuation_is_returned() {
        let (result, _, _) = dispatch(&["exit"], &mut Environment::default());
        assert_eq!(result.unwrap(), Continuation::Terminate);
    }

    #[test]
    fn test_empty_stage_is_noop() {
        let (result, out, err) = dispatch(&[], &mut Environment::default());
        assert_eq!(result.unwrap(), Continuation::Continue);
        assert!(out.is_empty() && err.is_empty());
    }

    #[test]
    fn test_unknown_program_fails_without_exec() {
        let mut env = Environment::default();
        env.set_var("PATH", "/nonexistent-dir");
        let (result, out, _) = dispatch(&["no-such-program-here"], &mut env);
        let err = result.unwrap_err();
        assert!(matches!(err, LaunchError::NotFound { .. }));
        assert_eq!(child_exit_code(&Err(err)), 127);
        assert!(out.is_empty());
    }

    #[test]
    fn test_builtin_exit_codes_are_zero() {
        assert_eq!(child_exit_code(&Ok(Continuation::Continue)), 0);
        assert_eq!(child_exit_code(&Ok(Continuation::Terminate)), 0);
    }
}
