#![allow(dead_code)]

use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// How long a script may run before it counts as hung.
pub const DEADLINE: Duration = Duration::from_secs(20);

pub fn shell_path() -> &'static str {
    env!("CARGO_BIN_EXE_shsh")
}

pub struct Run {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl Run {
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }

    pub fn stdout_lines(&self) -> Vec<&str> {
        self.stdout.lines().collect()
    }
}

fn drain(mut stream: impl Read + Send + 'static) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stream.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Waits for `child`, killing it once the deadline passes.
fn wait_with_deadline(child: &mut Child, what: &str) -> ExitStatus {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().expect("try_wait") {
            return status;
        }
        if start.elapsed() > DEADLINE {
            let _ = child.kill();
            let _ = child.wait();
            panic!("shell did not finish within {:?}: {}", DEADLINE, what);
        }
        thread::sleep(Duration::from_millis(20));
    }
}

fn run(mut cmd: Command, input: &[u8], what: &str) -> Run {
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to start shell");

    let mut stdin = child.stdin.take().expect("stdin");
    let input = input.to_vec();
    let feeder = thread::spawn(move || {
        let _ = stdin.write_all(&input);
    });
    let stdout = drain(child.stdout.take().expect("stdout"));
    let stderr = drain(child.stderr.take().expect("stderr"));

    let status = wait_with_deadline(&mut child, what);
    let _ = feeder.join();
    Run {
        status,
        stdout: stdout.join().expect("stdout reader"),
        stderr: stderr.join().expect("stderr reader"),
    }
}

/// Feeds `script` to the shell's standard input and collects its output.
pub fn run_script(script: &str) -> Run {
    run(Command::new(shell_path()), script.as_bytes(), script)
}

/// Like [`run_script`], for input that is not valid UTF-8.
pub fn run_script_bytes(script: &[u8]) -> Run {
    run(
        Command::new(shell_path()),
        script,
        &String::from_utf8_lossy(script),
    )
}

/// Runs `script` with the working directory set to `dir`.
pub fn run_script_in(dir: &std::path::Path, script: &str) -> Run {
    let mut cmd = Command::new(shell_path());
    cmd.current_dir(dir);
    run(cmd, script.as_bytes(), script)
}

/// Runs one line through `-c`.
pub fn run_command(line: &str) -> Run {
    let mut cmd = Command::new(shell_path());
    cmd.args(["-c", line]);
    run(cmd, b"", line)
}
