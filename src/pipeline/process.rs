//! Spawning, piping and bounding external processes.
//!
//! A pipeline moves through `spawned -> piped -> awaiting result` and ends in
//! `Completed` or `TimedOut`; spawn failures end it early with an error. Every
//! stage runs in its own process group owned by a [`ProcessGuard`], so the
//! stage and everything it forked are killed and reaped, and all pipe handles
//! closed, on every exit path.

use crate::errors::{PipelineError, PipelineResult};
use log::debug;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{Signal, killpg};
#[cfg(unix)]
use nix::unistd::Pid;
#[cfg(unix)]
use std::os::unix::process::CommandExt;

/// Environment variables layered over the inherited environment.
pub type EnvOverlay = BTreeMap<String, String>;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How long to wait, in total, for the captured pipes to close once every stage
/// group has been killed. Only a process that left its group can hold them longer.
const DRAIN_GRACE: Duration = Duration::from_secs(5);

/// One external program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    program: PathBuf,
    args: Vec<String>,
}

impl Stage {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn command_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Owns one stage. On drop the stage's whole process group is killed and the
/// child reaped, so helpers forked by wrappers such as the profiler go too.
struct ProcessGuard {
    child: Child,
}

impl ProcessGuard {
    fn new(child: Child) -> Self {
        Self { child }
    }

    fn kill_and_wait(&mut self) {
        self.kill_group();
        let _ = self.child.wait();
    }

    #[cfg(unix)]
    fn kill_group(&mut self) {
        // Every stage leads its own group, so the group id is the child's pid.
        let group = Pid::from_raw(self.child.id() as i32);
        if let Err(e) = killpg(group, Signal::SIGKILL) {
            if e != Errno::ESRCH {
                debug!("Could not kill process group {}: {}", group, e);
            }
        }
        let _ = self.child.kill();
    }

    #[cfg(not(unix))]
    fn kill_group(&mut self) {
        let _ = self.child.kill();
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        // The leader may have exited while its descendants still hold our pipes.
        self.kill_and_wait();
    }
}

/// Final state of a pipeline run.
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    Completed {
        status: ExitStatus,
        stdout: String,
        stderr: String,
    },
    TimedOut {
        stdout: String,
        stderr: String,
    },
}

impl PipelineOutcome {
    pub fn stdout(&self) -> &str {
        match self {
            PipelineOutcome::Completed { stdout, .. } | PipelineOutcome::TimedOut { stdout, .. } => {
                stdout
            }
        }
    }

    pub fn stderr(&self) -> &str {
        match self {
            PipelineOutcome::Completed { stderr, .. } | PipelineOutcome::TimedOut { stderr, .. } => {
                stderr
            }
        }
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, PipelineOutcome::TimedOut { .. })
    }
}

/// A chain of stages where each stage's stdout feeds the next stage's stdin.
///
/// Intermediate stages have their stderr discarded; only the final stage's
/// stdout and stderr are captured.
#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: Vec<Stage>,
    env: EnvOverlay,
    timeout: Duration,
    close_stdin: bool,
}

impl Pipeline {
    pub fn new(timeout: Duration) -> Self {
        Self {
            stages: Vec::new(),
            env: EnvOverlay::new(),
            timeout,
            close_stdin: false,
        }
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn env(mut self, overlay: &EnvOverlay) -> Self {
        self.env
            .extend(overlay.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Gives the first stage an empty stdin instead of inheriting ours.
    pub fn close_stdin(mut self) -> Self {
        self.close_stdin = true;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn command_line(&self) -> String {
        self.stages
            .iter()
            .map(Stage::command_line)
            .collect::<Vec<_>>()
            .join(" | ")
    }

    /// Runs the pipeline to completion or until the timeout elapses.
    ///
    /// A timeout is not an error: all stages are killed, output gathered so far
    /// is drained, and `PipelineOutcome::TimedOut` is returned.
    pub fn run(&self) -> PipelineResult<PipelineOutcome> {
        if self.stages.is_empty() {
            return Err(PipelineError::EmptyPipeline);
        }
        debug!("Running pipeline: {}", self.command_line());

        let last = self.stages.len() - 1;
        let mut guards: Vec<ProcessGuard> = Vec::with_capacity(self.stages.len());
        let mut upstream = None;

        for (index, stage) in self.stages.iter().enumerate() {
            let mut command = Command::new(&stage.program);
            command.args(&stage.args).envs(&self.env);
            command.stdin(match upstream.take() {
                Some(stdout) => Stdio::from(stdout),
                None if self.close_stdin => Stdio::null(),
                None => Stdio::inherit(),
            });
            command.stdout(Stdio::piped());
            #[cfg(unix)]
            command.process_group(0);
            command.stderr(if index == last {
                Stdio::piped()
            } else {
                Stdio::null()
            });

            let mut child = command.spawn().map_err(|source| PipelineError::Spawn {
                program: stage.program.display().to_string(),
                source,
            })?;
            // The command still owns the parent's copy of the upstream pipe. Closing it
            // lets an upstream stage see a broken pipe when this stage exits early.
            drop(command);

            if index != last {
                upstream = child.stdout.take();
            }
            guards.push(ProcessGuard::new(child));
        }

        let final_stage = match guards.last_mut() {
            Some(guard) => guard,
            None => return Err(PipelineError::EmptyPipeline),
        };
        let stdout_rx = drain(final_stage.child.stdout.take());
        let stderr_rx = drain(final_stage.child.stderr.take());

        let status = wait_with_timeout(&mut final_stage.child, self.timeout)?;
        if status.is_none() {
            final_stage.kill_and_wait();
        }
        // Tear down upstream stages before collecting output.
        drop(guards);

        let deadline = Instant::now() + DRAIN_GRACE;
        let stdout = collect(stdout_rx, deadline);
        let stderr = collect(stderr_rx, deadline);
        Ok(match status {
            Some(status) => PipelineOutcome::Completed {
                status,
                stdout,
                stderr,
            },
            None => PipelineOutcome::TimedOut { stdout, stderr },
        })
    }
}

/// Polls the child until it exits or `timeout` elapses. `None` means timed out.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> PipelineResult<Option<ExitStatus>> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() >= timeout {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Reads a pipe to its end on a helper thread so the child never blocks on a full pipe.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    if let Some(mut pipe) = pipe {
        thread::spawn(move || {
            let mut buffer = Vec::new();
            let _ = pipe.read_to_end(&mut buffer);
            let _ = tx.send(String::from_utf8_lossy(&buffer).into_owned());
        });
    }
    rx
}

fn collect(rx: mpsc::Receiver<String>, deadline: Instant) -> String {
    rx.recv_timeout(deadline.saturating_duration_since(Instant::now()))
        .unwrap_or_default()
}
