//! Starting the simulators and the proxy under supervision

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use oauth_sim::config::CLIENT_SECRET_ENV;
use oauth_sim::{AuthServerConfig, ResourceProviderConfig, authorization_server, resource_provider};
use supervisor::{HealthCheck, ProcessSpec, ProcessSupervisor, ServerTask};
use tracing::info;

use crate::error::{Error, Result};
use crate::template::{render_template_file, write_file};

/// Env var with the proxy command line; `{conf}` is replaced by the
/// rendered config path.
pub const PROXY_COMMAND_ENV: &str = "OAUTH_PROXY_COMMAND";

/// Env var with the path to the proxy config template.
pub const PROXY_TEMPLATE_ENV: &str = "OAUTH_PROXY_TEMPLATE";

const CONF_PLACEHOLDER: &str = "{conf}";

/// Runs the `oauth-sim-server` binary with generated config files.
#[derive(Debug, Clone)]
pub struct SimulatorLauncher {
    binary: PathBuf,
    dir: PathBuf,
    quiet: bool,
}

impl SimulatorLauncher {
    /// `dir` receives the generated TOML files.
    pub fn new(binary: impl Into<PathBuf>, dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            dir: dir.into(),
            quiet: false,
        }
    }

    /// Discard simulator output.
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    fn spec(&self, subcommand: &str, config_path: &Path) -> ProcessSpec {
        let spec = ProcessSpec::new(&self.binary)
            .arg(subcommand)
            .arg("--config")
            .arg(config_path);
        if self.quiet { spec.quiet() } else { spec }
    }

    async fn launch(&self, spec: ProcessSpec, health_url: String) -> Result<ProcessSupervisor> {
        let mut process = ProcessSupervisor::new(spec, HealthCheck::new(health_url))?;
        process.start().await?;
        Ok(process)
    }

    pub async fn authorization_server(&self, config: &AuthServerConfig) -> Result<ProcessSupervisor> {
        let path = self.dir.join("authorization-server.toml");
        write_file(&path, &config.to_toml()?)?;

        let spec = self
            .spec("authorization-server", &path)
            .env(CLIENT_SECRET_ENV, config.client.client_secret.expose());
        info!(listen_addr = %config.listen_addr, "launching authorization server");
        self.launch(spec, format!("http://{}/", config.listen_addr))
            .await
    }

    pub async fn resource_provider(
        &self,
        config: &ResourceProviderConfig,
    ) -> Result<ProcessSupervisor> {
        let path = self.dir.join("resource-provider.toml");
        write_file(&path, &config.to_toml()?)?;

        info!(listen_addr = %config.listen_addr, "launching resource provider");
        self.launch(
            self.spec("resource-provider", &path),
            format!("http://{}/", config.listen_addr),
        )
        .await
    }
}

/// Serve the authorization server on a task in this process.
pub async fn serve_authorization_server(config: AuthServerConfig) -> Result<ServerTask> {
    let addr = config.listen_addr;
    let mut task = ServerTask::new(
        "authorization-server",
        authorization_server::router(config),
        addr,
    )?;
    task.start().await?;
    Ok(task)
}

/// Serve the resource provider on a task in this process.
pub async fn serve_resource_provider(config: ResourceProviderConfig) -> Result<ServerTask> {
    let addr = config.listen_addr;
    let mut task = ServerTask::new("resource-provider", resource_provider::router(config), addr)?;
    task.start().await?;
    Ok(task)
}

/// Renders the proxy config template and runs the proxy command.
#[derive(Debug, Clone)]
pub struct ProxyLauncher {
    command: Vec<String>,
    template: PathBuf,
    conf_name: String,
}

impl ProxyLauncher {
    /// `command` is the program followed by its args; any `{conf}` in it is
    /// replaced with the rendered config path.
    pub fn new(command: Vec<String>, template: impl Into<PathBuf>) -> Result<Self> {
        if command.is_empty() {
            return Err(Error::Config(common::Error::Config(
                "proxy command must not be empty".into(),
            )));
        }
        Ok(Self {
            command,
            template: template.into(),
            conf_name: "proxy.conf".to_string(),
        })
    }

    /// Build from [`PROXY_COMMAND_ENV`] (whitespace-separated) and
    /// [`PROXY_TEMPLATE_ENV`]. `None` when either is unset.
    pub fn from_env() -> Option<Result<Self>> {
        let command = std::env::var(PROXY_COMMAND_ENV).ok()?;
        let template = std::env::var(PROXY_TEMPLATE_ENV).ok()?;
        let command = command.split_whitespace().map(str::to_owned).collect();
        Some(Self::new(command, template))
    }

    /// File name of the rendered config inside the work dir.
    pub fn conf_name(mut self, name: impl Into<String>) -> Self {
        self.conf_name = name.into();
        self
    }

    /// Render into `dir` and return the config path.
    pub fn render(&self, dir: &Path, vars: &BTreeMap<String, String>) -> Result<PathBuf> {
        let conf = dir.join(&self.conf_name);
        write_file(&conf, &render_template_file(&self.template, vars)?)?;
        Ok(conf)
    }

    fn spec(&self, conf: &Path) -> ProcessSpec {
        let conf = conf.to_string_lossy();
        let mut parts = self
            .command
            .iter()
            .map(|part| OsString::from(part.replace(CONF_PLACEHOLDER, &conf)));
        // new() rejects an empty command
        let program = parts.next().unwrap_or_default();
        ProcessSpec::new(program).args(parts)
    }

    /// Render the config and start the proxy, waiting until `health` passes.
    pub async fn start(
        &self,
        dir: &Path,
        vars: &BTreeMap<String, String>,
        health: HealthCheck,
    ) -> Result<ProcessSupervisor> {
        let conf = self.render(dir, vars)?;
        let spec = self.spec(&conf);
        info!(proxy = %spec, conf = %conf.display(), health_url = %health.url, "launching proxy");
        let mut process = ProcessSupervisor::new(spec, health)?;
        process.start().await?;
        Ok(process)
    }
}
