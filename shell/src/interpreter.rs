use crate::builtin::Registry;
use crate::command::{Continuation, ExecutableCommand, ExitCode};
use crate::dispatch::Dispatcher;
use crate::env::Environment;
use crate::external::ExternalCommand;
use crate::io_adapters::LineReader;
use crate::lexer;
use crate::parser::{self, Pipeline, Stage};
use crate::pipeline::Orchestrator;
use log::{debug, info, trace};
use std::io::{self, BufRead, Write};

/// Status reported for a line that does not parse.
pub const EXIT_SYNTAX_ERROR: ExitCode = 2;

/// Outcome of one command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionReport {
    pub continuation: Continuation,
    pub status: ExitCode,
}

impl ExecutionReport {
    fn proceed(status: ExitCode) -> Self {
        Self {
            continuation: Continuation::Continue,
            status,
        }
    }
}

/// Streams a built-in run by the shell itself reads and writes, and where the
/// shell reports its own errors.
///
/// External programs always use the process's standard streams.
pub enum Streams<'s> {
    /// The process's standard streams, locked only while a built-in runs.
    Inherited,
    Redefined {
        stdin: &'s mut dyn BufRead,
        stdout: &'s mut dyn Write,
        stderr: &'s mut dyn Write,
    },
}

impl Streams<'_> {
    fn run(&mut self, cmd: Box<dyn ExecutableCommand>, env: &mut Environment) -> Continuation {
        match self {
            Streams::Inherited => {
                let mut stdin = io::stdin().lock();
                let mut stdout = io::stdout().lock();
                let continuation = cmd.execute(&mut stdin, &mut stdout, &mut io::stderr(), env);
                let _ = stdout.flush();
                continuation
            }
            Streams::Redefined {
                stdin,
                stdout,
                stderr,
            } => cmd.execute(&mut **stdin, &mut **stdout, &mut **stderr, env),
        }
    }

    fn report(&mut self, message: std::fmt::Arguments) {
        let _ = match self {
            Streams::Inherited => writeln!(io::stderr(), "shsh: {}", message),
            Streams::Redefined { stderr, .. } => writeln!(stderr, "shsh: {}", message),
        };
    }

    fn flush(&mut self) {
        if let Streams::Redefined { stdout, .. } = self {
            let _ = stdout.flush();
        }
        let _ = io::stdout().flush();
    }
}

/// The shell: turns command lines into built-in calls, programs and
/// pipelines, and keeps the state that outlives a single line.
pub struct Interpreter {
    env: Environment,
    registry: Registry,
    last_status: ExitCode,
}

impl Interpreter {
    /// Create an interpreter over the current process environment.
    pub fn new(registry: Registry) -> Self {
        Self::with_env(registry, Environment::new())
    }

    pub fn with_env(registry: Registry, env: Environment) -> Self {
        Self {
            env,
            registry,
            last_status: 0,
        }
    }

    /// Status of the most recently executed line.
    pub fn last_status(&self) -> ExitCode {
        self.last_status
    }

    /// Executes one command line on the process's standard streams.
    pub fn execute_line(&mut self, line: &str) -> ExecutionReport {
        self.execute_line_with_streams(line, Streams::Inherited)
    }

    /// Executes one command line, running built-ins on `streams`.
    ///
    /// A blank line does nothing. A line that does not parse is reported and
    /// nothing of it runs.
    pub fn execute_line_with_streams(&mut self, line: &str, mut streams: Streams) -> ExecutionReport {
        let tokens = lexer::split_into_tokens(line);
        trace!("tokens: {:?}", tokens);
        if tokens.is_empty() {
            return ExecutionReport::proceed(self.last_status);
        }
        let report = match parser::construct_pipeline(tokens) {
            Ok(pipeline) => {
                debug!("parsed {} stages", pipeline.len());
                self.execute(&pipeline, &mut streams)
            }
            Err(e) => {
                streams.report(format_args!("syntax error: {}", e));
                ExecutionReport::proceed(EXIT_SYNTAX_ERROR)
            }
        };
        self.last_status = report.status;
        report
    }

    fn execute(&mut self, pipeline: &Pipeline, streams: &mut Streams) -> ExecutionReport {
        match pipeline.single() {
            Some(stage) => self.launch_single(stage, streams),
            None => {
                streams.flush();
                let run = Orchestrator::new(Dispatcher::new(&self.registry))
                    .run(pipeline.stages(), &mut self.env);
                if let Some(e) = &run.failure {
                    streams.report(format_args!("{:#}", e));
                }
                debug!(
                    "{} processes, {} channels, statuses {:?}",
                    run.spawned, run.channels, run.statuses
                );
                ExecutionReport::proceed(run.status())
            }
        }
    }

    /// A lone built-in runs inside the shell so `cd` and `exit` affect it; a
    /// lone program runs in a child the shell waits for.
    fn launch_single(&mut self, stage: &Stage, streams: &mut Streams) -> ExecutionReport {
        let Some(name) = stage.name() else {
            return ExecutionReport::proceed(0);
        };
        let args: Vec<&str> = stage.args().iter().map(String::as_str).collect();
        if let Some(cmd) = self.registry.try_create(name, &args) {
            return ExecutionReport {
                continuation: streams.run(cmd, &mut self.env),
                status: 0,
            };
        }

        streams.flush();
        let status = ExternalCommand::resolve(&self.env, stage.argv())
            .and_then(|external| external.spawn_and_wait())
            .unwrap_or_else(|e| {
                streams.report(format_args!("{}", e));
                e.exit_code()
            });
        ExecutionReport::proceed(status)
    }

    /// Reads and executes lines from `reader` until end of input or `exit`.
    pub fn repl(&mut self, reader: &mut dyn LineReader) -> anyhow::Result<ExitCode> {
        while let Some(line) = reader.read_line()? {
            let report = self.execute_line(&line);
            if !report.continuation.keep_running() {
                info!("exit requested");
                return Ok(0);
            }
        }
        info!("end of input");
        Ok(0)
    }
}

impl Default for Interpreter {
    /// An interpreter with the standard built-ins over the process environment.
    fn default() -> Self {
        Self::new(Registry::default())
    }
}
