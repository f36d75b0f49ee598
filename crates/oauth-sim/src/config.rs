//! Simulator configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The client secret is loaded from `OAUTH_SIM_CLIENT_SECRET` or
//! `client_secret_file`, never stored in the TOML directly to avoid
//! leaking it into rendered config files or logs.
//!
//! Per-test tweaks are expressed as [`ConfigOverrides`] layers merged in
//! order (later layers win) and applied once, before a router is built.
//! The resulting config is never mutated while serving.

use common::Secret;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Env var holding the registered client secret.
pub const CLIENT_SECRET_ENV: &str = "OAUTH_SIM_CLIENT_SECRET";

/// Env var holding the config file path when `--config` is not given.
pub const CONFIG_PATH_ENV: &str = "OAUTH_SIM_CONFIG";

const DEFAULT_CONFIG_FILE: &str = "oauth-sim.toml";

/// The single registered OAuth client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRegistration {
    pub client_id: String,
    #[serde(skip)]
    pub client_secret: Secret<String>,
    /// Path to a file containing the client secret (alternative to the env var)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret_file: Option<PathBuf>,
    /// Space-delimited set of scopes the client may request
    pub scope: String,
    pub redirect_uri: String,
}

impl ClientRegistration {
    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scope.split_whitespace()
    }

    /// True when `requested` is exactly one of the registered scopes.
    pub fn allows_scope(&self, requested: &str) -> bool {
        self.scopes().any(|s| s == requested)
    }
}

/// The one logical session the authorization server models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantState {
    pub access_token: String,
    pub refresh_token: String,
    pub auth_code: String,
    pub username: String,
    #[serde(default = "default_approve_request")]
    pub approve_request: bool,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

/// Authorization server settings: listener, client registration, grant state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    pub client: ClientRegistration,
    pub grant: GrantState,
}

/// Resource provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceProviderConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    pub access_token: String,
}

fn default_approve_request() -> bool {
    true
}

fn default_expires_in() -> u64 {
    3600
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 0))
}

impl AuthServerConfig {
    pub fn new(client: ClientRegistration, grant: GrantState) -> Self {
        Self {
            listen_addr: default_listen_addr(),
            client,
            grant,
        }
    }

    /// Load configuration from a TOML file, then resolve the client secret.
    ///
    /// Secret resolution order:
    /// 1. `OAUTH_SIM_CLIENT_SECRET` env var
    /// 2. `client_secret_file` path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: AuthServerConfig = toml::from_str(&contents)?;

        if let Ok(secret) = std::env::var(CLIENT_SECRET_ENV) {
            config.client.client_secret = Secret::new(secret);
        } else if let Some(ref secret_file) = config.client.client_secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read client_secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            config.client.client_secret = Secret::new(secret.trim().to_owned());
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the simulator cannot meaningfully serve.
    pub fn validate(&self) -> common::Result<()> {
        let client = &self.client;
        if client.client_id.is_empty() {
            return Err(common::Error::Config("client_id must not be empty".into()));
        }
        if client.client_secret.is_empty() {
            return Err(common::Error::Config(format!(
                "client secret missing: set {CLIENT_SECRET_ENV} or client_secret_file"
            )));
        }
        if client.scopes().next().is_none() {
            return Err(common::Error::Config("scope must not be empty".into()));
        }
        match url::Url::parse(&client.redirect_uri) {
            Ok(uri) if uri.scheme() == "http" || uri.scheme() == "https" => {}
            _ => {
                return Err(common::Error::Config(format!(
                    "redirect_uri must be an absolute http(s) URL, got: {}",
                    client.redirect_uri
                )));
            }
        }
        Ok(())
    }

    /// Render as TOML. The client secret is never part of the output.
    pub fn to_toml(&self) -> common::Result<String> {
        Ok(toml::to_string(self)?)
    }

    /// Apply a merged override layer, producing the config to serve.
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        let ConfigOverrides {
            client_id,
            client_secret,
            scope,
            redirect_uri,
            access_token,
            refresh_token,
            auth_code,
            username,
            approve_request,
            expires_in,
        } = overrides;

        if let Some(v) = client_id {
            self.client.client_id = v;
        }
        if let Some(v) = client_secret {
            self.client.client_secret = Secret::new(v);
        }
        if let Some(v) = scope {
            self.client.scope = v;
        }
        if let Some(v) = redirect_uri {
            self.client.redirect_uri = v;
        }
        if let Some(v) = access_token {
            self.grant.access_token = v;
        }
        if let Some(v) = refresh_token {
            self.grant.refresh_token = v;
        }
        if let Some(v) = auth_code {
            self.grant.auth_code = v;
        }
        if let Some(v) = username {
            self.grant.username = v;
        }
        if let Some(v) = approve_request {
            self.grant.approve_request = v;
        }
        if let Some(v) = expires_in {
            self.grant.expires_in = v;
        }
        self
    }
}

impl ResourceProviderConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            listen_addr: default_listen_addr(),
            access_token: access_token.into(),
        }
    }

    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: ResourceProviderConfig = toml::from_str(&contents)?;

        if config.access_token.is_empty() {
            return Err(common::Error::Config(
                "access_token must not be empty".into(),
            ));
        }
        Ok(config)
    }

    pub fn to_toml(&self) -> common::Result<String> {
        Ok(toml::to_string(self)?)
    }

    /// Apply the same override layer the authorization server gets, so both
    /// simulators agree on the current access token.
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(v) = overrides.access_token {
            self.access_token = v;
        }
        self
    }
}

/// Resolve config file path from CLI arg or `OAUTH_SIM_CONFIG` env var.
pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
    if let Some(p) = cli_path {
        return PathBuf::from(p);
    }
    if let Ok(p) = std::env::var(CONFIG_PATH_ENV) {
        return PathBuf::from(p);
    }
    PathBuf::from(DEFAULT_CONFIG_FILE)
}

/// One layer of per-test overrides over the configuration surface.
///
/// Unset fields leave the underlying value alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    client_id: Option<String>,
    client_secret: Option<String>,
    scope: Option<String>,
    redirect_uri: Option<String>,
    access_token: Option<String>,
    refresh_token: Option<String>,
    auth_code: Option<String>,
    username: Option<String>,
    approve_request: Option<bool>,
    expires_in: Option<u64>,
}

macro_rules! string_override {
    ($($name:ident),* $(,)?) => {
        $(
            pub fn $name(mut self, value: impl Into<String>) -> Self {
                self.$name = Some(value.into());
                self
            }
        )*
    };
}

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    string_override!(
        client_id,
        client_secret,
        scope,
        redirect_uri,
        access_token,
        refresh_token,
        auth_code,
        username,
    );

    pub fn approve_request(mut self, approve: bool) -> Self {
        self.approve_request = Some(approve);
        self
    }

    pub fn expires_in(mut self, secs: u64) -> Self {
        self.expires_in = Some(secs);
        self
    }

    /// Layer `later` over `self`; fields set in `later` win.
    pub fn merge(self, later: ConfigOverrides) -> Self {
        Self {
            client_id: later.client_id.or(self.client_id),
            client_secret: later.client_secret.or(self.client_secret),
            scope: later.scope.or(self.scope),
            redirect_uri: later.redirect_uri.or(self.redirect_uri),
            access_token: later.access_token.or(self.access_token),
            refresh_token: later.refresh_token.or(self.refresh_token),
            auth_code: later.auth_code.or(self.auth_code),
            username: later.username.or(self.username),
            approve_request: later.approve_request.or(self.approve_request),
            expires_in: later.expires_in.or(self.expires_in),
        }
    }

    /// Merge any number of layers in order.
    pub fn merge_all(layers: impl IntoIterator<Item = ConfigOverrides>) -> Self {
        layers.into_iter().fold(Self::default(), Self::merge)
    }
}
