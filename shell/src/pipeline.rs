//! Process orchestration for pipelines of two or more stages.
//!
//! For `N` stages the orchestrator creates `N - 1` channels and `N` processes.
//! Channel `i` is created right before process `i`, the first of its two users,
//! and the shell closes its copy right after process `i + 1`, the second one,
//! exists. When the shell starts waiting it holds no channel endpoint at all,
//! so every reader sees end-of-stream once its writer finished.

use crate::command::ExitCode;
use crate::dispatch::Dispatcher;
use crate::env::Environment;
use crate::parser::Stage;
use crate::redirect::{ChannelTable, RedirectionPlan};
use anyhow::{Context, anyhow};
use log::{debug, warn};
use nix::errno::Errno;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, fork};
use std::io::{self, Write};

/// What happened to one pipeline.
#[derive(Debug, Default)]
pub struct PipelineRun {
    /// Processes created, in stage order.
    pub spawned: usize,
    /// Channels created.
    pub channels: usize,
    /// Exit status of every created process, in stage order.
    pub statuses: Vec<ExitCode>,
    /// Why the pipeline was cut short, if it was.
    pub failure: Option<anyhow::Error>,
}

impl PipelineRun {
    /// The pipeline's status: the last stage's, or 1 when not every stage could
    /// be started.
    pub fn status(&self) -> ExitCode {
        if self.failure.is_some() {
            return 1;
        }
        self.statuses.last().copied().unwrap_or(0)
    }
}

pub struct Orchestrator<'a> {
    dispatcher: Dispatcher<'a>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(dispatcher: Dispatcher<'a>) -> Self {
        Self { dispatcher }
    }

    /// Starts one process per stage with its standard streams wired to the
    /// neighbouring channels, then waits for all of them.
    ///
    /// If a channel or process cannot be created, the remaining stages are
    /// not started; the ones already running are still waited for.
    pub fn run(&self, stages: &[Stage], env: &mut Environment) -> PipelineRun {
        let stage_count = stages.len();
        debug!("starting pipeline of {} stages", stage_count);

        // Anything still buffered would otherwise be written once per child.
        let _ = io::stdout().flush();

        let mut channels = ChannelTable::default();
        let mut children: Vec<Pid> = Vec::with_capacity(stage_count);
        let mut failure = None;

        for (index, stage) in stages.iter().enumerate() {
            let plan = RedirectionPlan::for_stage(index, stage_count);
            if plan.stdout.is_some() {
                if let Err(e) = channels.open_next() {
                    failure = Some(e.context(format!("stage {}", index + 1)));
                    break;
                }
            }

            // SAFETY: the shell is single-threaded; the child only runs the
            // stage and then exits or replaces its image.
            match unsafe { fork() } {
                Ok(ForkResult::Child) => {
                    let inherited = std::mem::take(&mut channels);
                    self.dispatcher.run_in_child(stage, plan, inherited, env)
                }
                Ok(ForkResult::Parent { child }) => {
                    debug!("stage {} ({:?}) is pid {}", index + 1, stage.name(), child);
                    children.push(child);
                }
                Err(errno) => {
                    failure = Some(anyhow!(errno).context(format!("cannot start stage {}", index + 1)));
                    break;
                }
            }

            if let Some(done) = plan.released_after_spawn() {
                channels.close(done);
            }
        }

        if failure.is_none() {
            debug_assert_eq!(channels.open_count(), 0, "channel left open after start");
        }
        let run_channels = channels.created();
        // Endpoints left behind by an aborted start are closed here, so stages
        // already running see end-of-stream or a broken pipe instead of blocking.
        drop(channels);

        let statuses = children
            .iter()
            .map(|&pid| wait_for(pid).unwrap_or_else(|e| {
                warn!("{:#}", e);
                1
            }))
            .collect::<Vec<_>>();
        debug!("pipeline finished with statuses {:?}", statuses);

        PipelineRun {
            spawned: children.len(),
            channels: run_channels,
            statuses,
            failure,
        }
    }
}

/// Blocks until `pid` exits or is killed by a signal and returns its status.
///
/// A signal death is reported as `128 + signal`.
pub fn wait_for(pid: Pid) -> anyhow::Result<ExitCode> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(code),
            Ok(WaitStatus::Signaled(_, signal, _)) => return Ok(128 + signal as i32),
            Ok(other) => debug!("pid {} changed state: {:?}", pid, other),
            Err(Errno::EINTR) => continue,
            Err(errno) => return Err(errno).with_context(|| format!("waiting for pid {}", pid)),
        }
    }
}
