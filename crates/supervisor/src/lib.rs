//! Lifecycle management for servers under test
//!
//! Two supervisors share one lifecycle ([`lifecycle::handle_event`]):
//! [`ProcessSupervisor`] for an external executable (the proxy under test,
//! or a simulator binary) and [`ServerTask`] for an in-process axum router.
//! Both block in `start` until the health URL answers or the bounded retry
//! budget runs out, and both make `stop` idempotent and infallible so it
//! can run from `Drop`.

pub mod error;
pub mod health;
pub mod lifecycle;
pub mod process;
pub mod signal;
pub mod task;

use std::future::Future;

pub use error::{Error, Result};
pub use health::HealthCheck;
pub use lifecycle::{RetryBudget, SupervisorState};
pub use process::{ProcessSpec, ProcessSupervisor};
pub use task::ServerTask;

/// Common surface of everything a test fixture can start and stop.
pub trait Supervised {
    /// Start and wait until healthy. On error nothing is left running.
    fn start(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Single health probe.
    fn healthy(&self) -> impl Future<Output = bool> + Send;

    /// Idempotent teardown.
    fn stop(&mut self);

    fn state(&self) -> &SupervisorState;
}

impl Supervised for ProcessSupervisor {
    fn start(&mut self) -> impl Future<Output = Result<()>> + Send {
        ProcessSupervisor::start(self)
    }

    fn healthy(&self) -> impl Future<Output = bool> + Send {
        ProcessSupervisor::healthy(self)
    }

    fn stop(&mut self) {
        ProcessSupervisor::stop(self)
    }

    fn state(&self) -> &SupervisorState {
        ProcessSupervisor::state(self)
    }
}

impl Supervised for ServerTask {
    fn start(&mut self) -> impl Future<Output = Result<()>> + Send {
        ServerTask::start(self)
    }

    fn healthy(&self) -> impl Future<Output = bool> + Send {
        ServerTask::healthy(self)
    }

    fn stop(&mut self) {
        ServerTask::stop(self)
    }

    fn state(&self) -> &SupervisorState {
        ServerTask::state(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::routing::get;

    async fn cycle<S: Supervised>(target: &mut S) {
        target.start().await.unwrap();
        assert!(target.healthy().await);
        target.stop();
        target.stop();
        assert_eq!(target.state(), &SupervisorState::Stopped);
    }

    #[tokio::test]
    async fn server_task_through_trait() {
        let router = Router::new().route("/", get(|| async { "OK" }));
        let mut task = ServerTask::new("trait", router, "127.0.0.1:0".parse().unwrap()).unwrap();
        cycle(&mut task).await;
    }
}
