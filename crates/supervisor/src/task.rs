//! In-process supervision
//!
//! [`ServerTask`] serves an axum [`Router`] on a tokio task and gives it the
//! same start/probe/stop lifecycle as an OS process. Used for the
//! simulators when a test does not need a separate binary.

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::health::{self, DEFAULT_INTERVAL, DEFAULT_MAX_ATTEMPTS, HealthCheck};
use crate::lifecycle::{
    RetryBudget, SupervisorAction, SupervisorEvent, SupervisorState, handle_event,
};

struct Running {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

pub struct ServerTask {
    name: String,
    router: Router,
    bind_addr: SocketAddr,
    health_path: String,
    budget: RetryBudget,
    client: reqwest::Client,
    running: Option<Running>,
    state: SupervisorState,
}

impl ServerTask {
    /// `bind_addr` may use port 0; the bound address is available from
    /// [`ServerTask::local_addr`] after start.
    pub fn new(name: impl Into<String>, router: Router, bind_addr: SocketAddr) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(1))
            .build()?;
        Ok(Self {
            name: name.into(),
            router,
            bind_addr,
            health_path: "/".to_string(),
            budget: RetryBudget {
                max_attempts: DEFAULT_MAX_ATTEMPTS,
                interval: DEFAULT_INTERVAL,
            },
            client,
            running: None,
            state: SupervisorState::NotStarted,
        })
    }

    pub fn health_path(mut self, path: impl Into<String>) -> Self {
        self.health_path = path.into();
        self
    }

    pub fn budget(mut self, budget: RetryBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn state(&self) -> &SupervisorState {
        &self.state
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }

    /// `http://<local_addr>` of the running server.
    pub fn base_url(&self) -> Option<String> {
        self.local_addr().map(|addr| format!("http://{addr}"))
    }

    fn health_check(&self, addr: SocketAddr) -> HealthCheck {
        HealthCheck::new(format!("http://{addr}{}", self.health_path))
            .max_attempts(self.budget.max_attempts)
            .interval(self.budget.interval)
    }

    fn transition(&mut self, event: SupervisorEvent) -> SupervisorAction {
        let state = std::mem::replace(&mut self.state, SupervisorState::NotStarted);
        let (state, action) = handle_event(state, event, self.budget);
        self.state = state;
        action
    }

    pub async fn start(&mut self) -> Result<()> {
        if self.running.is_some() {
            return Err(Error::AlreadyStarted(self.name.clone()));
        }

        let bound = match TcpListener::bind(self.bind_addr).await {
            Ok(listener) => listener.local_addr().map(|addr| (listener, addr)),
            Err(e) => Err(e),
        };
        let (listener, local_addr) = bound.map_err(|source| {
            self.state = SupervisorState::Failed {
                error: source.to_string(),
            };
            Error::Bind {
                addr: self.bind_addr,
                source,
            }
        })?;

        let (tx, rx) = oneshot::channel();
        let router = self.router.clone();
        let name = self.name.clone();
        let handle = tokio::spawn(async move {
            let shutdown = async {
                let _ = rx.await;
            };
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await
            {
                warn!(server = %name, error = %e, "server task exited with error");
            }
        });
        info!(server = %self.name, %local_addr, "server task started");
        self.running = Some(Running {
            local_addr,
            shutdown: tx,
            handle,
        });

        let check = self.health_check(local_addr);
        let mut action = self.transition(SupervisorEvent::Spawned);
        loop {
            match action {
                SupervisorAction::Probe => {}
                SupervisorAction::Wait { delay } => tokio::time::sleep(delay).await,
                SupervisorAction::Terminate { error } => {
                    self.stop();
                    return Err(Error::StartupFailure {
                        target: self.name.clone(),
                        last_error: error,
                    });
                }
                SupervisorAction::None => {
                    if self.state == SupervisorState::Healthy {
                        return Ok(());
                    }
                }
            }

            let finished = self.running.as_ref().is_some_and(|r| r.handle.is_finished());
            let event = match health::probe(&self.client, &check).await {
                Ok(()) => SupervisorEvent::ProbeSucceeded,
                Err(e) if finished => {
                    SupervisorEvent::Exited(format!("server task ended before becoming healthy ({e})"))
                }
                Err(e) => SupervisorEvent::ProbeFailed(e),
            };
            action = self.transition(event);
        }
    }

    pub async fn healthy(&self) -> bool {
        match self.local_addr() {
            Some(addr) => health::probe(&self.client, &self.health_check(addr))
                .await
                .is_ok(),
            None => false,
        }
    }

    /// Signal shutdown and abort the task. The listener is closed by the
    /// time the runtime polls the aborted task.
    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            let _ = running.shutdown.send(());
            running.handle.abort();
            info!(server = %self.name, local_addr = %running.local_addr, "server task stopped");
        }
        self.transition(SupervisorEvent::StopRequested);
    }

    /// Graceful variant of [`ServerTask::stop`]: waits for in-flight
    /// requests to drain and the listener to be dropped.
    pub async fn stop_gracefully(&mut self) {
        if let Some(running) = self.running.take() {
            let _ = running.shutdown.send(());
            if let Err(e) = running.handle.await {
                warn!(server = %self.name, error = %e, "server task join failed");
            }
            info!(server = %self.name, local_addr = %running.local_addr, "server task stopped");
        }
        self.transition(SupervisorEvent::StopRequested);
    }
}

impl Drop for ServerTask {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            let _ = running.shutdown.send(());
            running.handle.abort();
        }
    }
}
