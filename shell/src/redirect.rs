//! Channels between pipeline stages and the plan that binds them to a stage's
//! standard streams.
//!
//! Every endpoint is an [`OwnedFd`]: dropping a [`Channel`] or a [`ChannelTable`]
//! closes what it holds, so no path through the orchestrator can forget a close.

use anyhow::{Context, Result};
use log::{debug, trace};
use nix::fcntl::{FcntlArg, FdFlag, OFlag, fcntl};
use nix::unistd::{dup2, pipe2};
use std::os::fd::{AsRawFd, IntoRawFd, OwnedFd, RawFd};

const STDIN_FD: RawFd = 0;
const STDOUT_FD: RawFd = 1;

/// Unidirectional pipe connecting stage `i` to stage `i + 1`.
#[derive(Debug)]
pub struct Channel {
    read: OwnedFd,
    write: OwnedFd,
}

impl Channel {
    /// Creates a pipe. Both ends are close-on-exec, so a descriptor that is not
    /// explicitly bound to a standard stream never survives into a program.
    pub fn open() -> Result<Self> {
        let (read, write) = pipe2(OFlag::O_CLOEXEC).context("cannot create pipe")?;
        Ok(Self { read, write })
    }

    pub fn raw_fds(&self) -> (RawFd, RawFd) {
        (self.read.as_raw_fd(), self.write.as_raw_fd())
    }
}

/// All channels of one pipeline, indexed by boundary: slot `i` joins stage `i`
/// and stage `i + 1`. A slot is `None` before its channel is created and after
/// its owner released it.
#[derive(Debug, Default)]
pub struct ChannelTable {
    slots: Vec<Option<Channel>>,
}

impl ChannelTable {
    /// Creates the channel for the next boundary and returns its index.
    pub fn open_next(&mut self) -> Result<usize> {
        let boundary = self.slots.len();
        let channel = Channel::open().with_context(|| format!("boundary {}", boundary))?;
        let (r, w) = channel.raw_fds();
        debug!("channel {} open: read fd {}, write fd {}", boundary, r, w);
        self.slots.push(Some(channel));
        Ok(boundary)
    }

    /// Closes both ends of the channel at `boundary`, if still open.
    pub fn close(&mut self, boundary: usize) {
        if let Some(slot) = self.slots.get_mut(boundary) {
            if slot.take().is_some() {
                trace!("channel {} closed", boundary);
            }
        }
    }

    /// Removes the channel at `boundary` from the table.
    pub fn take(&mut self, boundary: usize) -> Option<Channel> {
        self.slots.get_mut(boundary).and_then(Option::take)
    }

    /// Number of channels ever created.
    pub fn created(&self) -> usize {
        self.slots.len()
    }

    /// Number of channels whose endpoints are still open here.
    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

/// Which channel endpoints a stage binds to its standard streams.
///
/// `stdin` names the channel whose read end becomes standard input, `stdout`
/// the channel whose write end becomes standard output. `None` keeps the
/// stream inherited from the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedirectionPlan {
    pub stdin: Option<usize>,
    pub stdout: Option<usize>,
}

impl RedirectionPlan {
    /// The plan for stage `index` of a pipeline with `stage_count` stages.
    pub fn for_stage(index: usize, stage_count: usize) -> Self {
        Self {
            stdin: index.checked_sub(1),
            stdout: (index + 1 < stage_count).then_some(index),
        }
    }

    pub fn redirects_stdin(&self) -> bool {
        self.stdin.is_some()
    }

    /// Channels the parent may close once this stage exists: the one feeding
    /// its standard input has both its users created by then.
    pub fn released_after_spawn(&self) -> Option<usize> {
        self.stdin
    }

    /// Binds the planned endpoints onto standard input and output, then closes
    /// every endpoint in `channels`, the bound originals included.
    ///
    /// Consumes the table so nothing stays open on any return path.
    pub fn apply(&self, mut channels: ChannelTable) -> Result<()> {
        debug!("applying {:?}", self);
        if let Some(boundary) = self.stdin {
            let channel = channels
                .take(boundary)
                .with_context(|| format!("channel {} is not open", boundary))?;
            bind(channel.read, STDIN_FD).context("cannot redirect standard input")?;
        }
        if let Some(boundary) = self.stdout {
            let channel = channels
                .take(boundary)
                .with_context(|| format!("channel {} is not open", boundary))?;
            bind(channel.write, STDOUT_FD).context("cannot redirect standard output")?;
        }
        Ok(())
    }
}

/// Makes `target` refer to the same pipe as `fd` and closes `fd`.
fn bind(fd: OwnedFd, target: RawFd) -> Result<()> {
    if fd.as_raw_fd() == target {
        // Already in place; keep it open across exec.
        fcntl(target, FcntlArg::F_SETFD(FdFlag::empty()))?;
        let _ = fd.into_raw_fd();
    } else {
        dup2(fd.as_raw_fd(), target)?;
    }
    Ok(())
}
