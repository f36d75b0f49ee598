//! OAuth2 simulator server
//!
//! Runs one simulator as a standalone process so a test harness can
//! supervise it like any other server:
//! 1. `authorization-server`: `/authorize`, `/token`, `/userinfo`
//! 2. `resource-provider`: bearer-protected `/ping`
//!
//! Both serve `/` as a health check and `/metrics` in Prometheus format.

mod app;
mod cli;
mod metrics;

use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use oauth_sim::{AuthServerConfig, ResourceProviderConfig};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Simulator, USAGE};

/// How long in-flight requests may take to finish after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Load the configuration for `simulator` and build its router.
fn load_simulator(cli: &Cli) -> Result<(Router, std::net::SocketAddr)> {
    let path = &cli.config_path;
    info!(simulator = cli.simulator.name(), path = %path.display(), "loading configuration");

    match cli.simulator {
        Simulator::AuthorizationServer => {
            let config = AuthServerConfig::load(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?;
            info!(
                listen_addr = %config.listen_addr,
                client_id = %config.client.client_id,
                scope = %config.client.scope,
                username = %config.grant.username,
                approve_request = config.grant.approve_request,
                "configuration loaded"
            );
            let addr = config.listen_addr;
            Ok((oauth_sim::authorization_server::router(config), addr))
        }
        Simulator::ResourceProvider => {
            let config = ResourceProviderConfig::load(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?;
            info!(listen_addr = %config.listen_addr, "configuration loaded");
            let addr = config.listen_addr;
            Ok((oauth_sim::resource_provider::router(config), addr))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs, filter from LOG_LEVEL, then RUST_LOG, then info
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let cli = Cli::parse(std::env::args().skip(1))
        .map_err(|e| anyhow::anyhow!("{e}\n{USAGE}"))?;
    info!(simulator = cli.simulator.name(), "starting oauth-sim-server");

    let prometheus = metrics::install_recorder().context("failed to install metrics recorder")?;
    let (simulator, listen_addr) = load_simulator(&cli)?;
    let app = app::build_app(simulator, prometheus);

    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    let local_addr = listener.local_addr().context("failed to read bound address")?;
    info!(addr = %local_addr, simulator = cli.simulator.name(), "accepting requests");

    // The drain timer starts when the signal arrives, not at startup.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => info!("all in-flight requests drained"),
        Ok(Ok(Err(e))) => error!(error = %e, "server error during shutdown"),
        Ok(Err(e)) => error!(error = %e, "server task panicked"),
        Err(_) => warn!(
            drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "drain timeout exceeded, forcing shutdown"
        ),
    }

    info!("shutdown complete");
    Ok(())
}

/// Wait for SIGTERM or SIGINT.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_resource_provider_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write(
            &dir,
            "rp.toml",
            "listen_addr = \"127.0.0.1:0\"\naccess_token = \"T1\"\n",
        );

        let cli = Cli {
            simulator: Simulator::ResourceProvider,
            config_path,
        };
        let (_router, addr) = load_simulator(&cli).unwrap();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
    }

    #[test]
    fn missing_config_file_names_the_path() {
        let cli = Cli {
            simulator: Simulator::ResourceProvider,
            config_path: PathBuf::from("/nonexistent/oauth-sim.toml"),
        };
        let err = load_simulator(&cli).unwrap_err();
        assert!(
            format!("{err:#}").contains("/nonexistent/oauth-sim.toml"),
            "got: {err:#}"
        );
    }

    #[test]
    fn authorization_server_config_is_validated() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write(
            &dir,
            "as.toml",
            r#"
[client]
client_id = ""
client_secret_file = "/nonexistent/secret"
scope = "read"
redirect_uri = "https://127.0.0.1:8443/_oauth/callback"

[grant]
access_token = "T1"
refresh_token = "R1"
auth_code = "C1"
username = "flynn"
"#,
        );

        let cli = Cli {
            simulator: Simulator::AuthorizationServer,
            config_path,
        };
        assert!(load_simulator(&cli).is_err());
    }
}
