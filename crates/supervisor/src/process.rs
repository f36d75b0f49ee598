//! Out-of-process supervision
//!
//! [`ProcessSupervisor`] spawns an executable, polls its health-check URL on
//! a fixed interval until it answers or the retry budget is exhausted, and
//! on teardown sends a graceful termination, waits a short grace window,
//! then unconditionally kills the pid so no listener survives into the next
//! test module.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::health::{self, HealthCheck};
use crate::lifecycle::{SupervisorAction, SupervisorEvent, SupervisorState, handle_event};
use crate::signal;

/// Default wait between the graceful request and the forced kill.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(200);

/// What to run.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    program: OsString,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
    current_dir: Option<PathBuf>,
    quiet: bool,
}

impl ProcessSpec {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            args: Vec::new(),
            envs: Vec::new(),
            current_dir: None,
            quiet: false,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_owned()));
        self
    }

    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.envs
            .push((key.as_ref().to_owned(), value.as_ref().to_owned()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Discard the child's stdout/stderr instead of inheriting them.
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null());
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        if self.quiet {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }
        command
    }
}

impl fmt::Display for ProcessSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())
    }
}

/// Owns one OS process for the duration of a test scope.
pub struct ProcessSupervisor {
    spec: ProcessSpec,
    health: HealthCheck,
    grace_period: Duration,
    client: reqwest::Client,
    child: Option<Child>,
    last_pid: Option<u32>,
    state: SupervisorState,
}

impl ProcessSupervisor {
    pub fn new(spec: ProcessSpec, health: HealthCheck) -> Result<Self> {
        let client = health.client()?;
        Ok(Self {
            spec,
            health,
            grace_period: DEFAULT_GRACE_PERIOD,
            client,
            child: None,
            last_pid: None,
            state: SupervisorState::NotStarted,
        })
    }

    pub fn grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    pub fn state(&self) -> &SupervisorState {
        &self.state
    }

    /// Pid of the most recently spawned process, even after it was stopped.
    pub fn pid(&self) -> Option<u32> {
        self.last_pid
    }

    pub fn health_check(&self) -> &HealthCheck {
        &self.health
    }

    fn transition(&mut self, event: SupervisorEvent) -> SupervisorAction {
        let state = std::mem::replace(&mut self.state, SupervisorState::NotStarted);
        let (state, action) = handle_event(state, event, self.health.budget());
        self.state = state;
        action
    }

    /// Spawn the process and block until it is healthy.
    ///
    /// On failure the process has already been terminated and reaped when
    /// this returns.
    pub async fn start(&mut self) -> Result<()> {
        if self.child.is_some() {
            return Err(Error::AlreadyStarted(self.spec.to_string()));
        }

        let child = self.spec.command().spawn().map_err(|source| {
            self.state = SupervisorState::Failed {
                error: source.to_string(),
            };
            Error::Spawn {
                program: self.spec.to_string(),
                source,
            }
        })?;
        let pid = child.id();
        info!(program = %self.spec, pid, health_url = %self.health.url, "process spawned");
        self.child = Some(child);
        self.last_pid = Some(pid);

        let mut action = self.transition(SupervisorEvent::Spawned);
        loop {
            match action {
                SupervisorAction::Probe => {}
                SupervisorAction::Wait { delay } => tokio::time::sleep(delay).await,
                SupervisorAction::Terminate { error } => {
                    warn!(program = %self.spec, pid, error = %error, "process failed to start");
                    self.stop();
                    return Err(Error::StartupFailure {
                        target: self.spec.to_string(),
                        last_error: error,
                    });
                }
                SupervisorAction::None => {
                    if self.state == SupervisorState::Healthy {
                        info!(program = %self.spec, pid, "process healthy");
                        return Ok(());
                    }
                }
            }

            let event = match health::probe(&self.client, &self.health).await {
                Ok(()) => SupervisorEvent::ProbeSucceeded,
                Err(probe_error) => match self.exit_status() {
                    Some(status) => SupervisorEvent::Exited(format!(
                        "process exited with {status} before becoming healthy ({probe_error})"
                    )),
                    None => {
                        debug!(pid, error = %probe_error, "health probe failed");
                        SupervisorEvent::ProbeFailed(probe_error)
                    }
                },
            };
            action = self.transition(event);
        }
    }

    /// One probe of the health-check URL.
    pub async fn healthy(&self) -> bool {
        health::probe(&self.client, &self.health).await.is_ok()
    }

    fn exit_status(&mut self) -> Option<std::process::ExitStatus> {
        self.child.as_mut().and_then(|c| c.try_wait().ok().flatten())
    }

    /// Terminate gracefully, wait the grace period, then kill. Never fails
    /// and is safe to call in any state, any number of times.
    pub fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let pid = child.id();
            match child.try_wait() {
                // Already exited and reaped: the pid may no longer be ours
                Ok(Some(status)) => debug!(pid, %status, "process already exited"),
                _ => {
                    signal::terminate(&mut child);
                    std::thread::sleep(self.grace_period);
                    // Unconditional: a graceful exit may still leave a listener behind
                    signal::kill(&mut child);
                    match child.wait() {
                        Ok(status) => debug!(pid, %status, "process reaped"),
                        Err(e) => warn!(pid, error = %e, "failed to reap process"),
                    }
                }
            }
            info!(program = %self.spec, pid, "process stopped");
        }
        self.transition(SupervisorEvent::StopRequested);
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        self.stop();
    }
}
