//! Per-module test environment: ports, base URIs, the registered client and
//! the grant state, and the proxy template variables derived from them.

use std::collections::BTreeMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;

use oauth_sim::{
    AuthServerConfig, ClientRegistration, ConfigOverrides, GrantState, ResourceProviderConfig,
};
use tempfile::TempDir;

use crate::client::HttpClient;
use crate::error::Result;
use crate::merge::merge_maps;
use crate::ports::free_tcp_port;

/// Access tokens handed out across a login/refresh sequence.
pub const ACCESS_TOKENS: [&str; 3] = [
    "00f8aadb-78d8-4f6b-aa20-1212dc656b7c",
    "11feaa17-4083-487c-a8f5-3c57b6173dae",
    "22f636da-f340-435e-8038-11145edca174",
];

pub const CLIENT_ID: &str = "d3a7c1d6-fdeb-4280-ad63-8459849f2b5f";
pub const CLIENT_SECRET: &str = "IetaeFaeni8aif2hee1OomailoiGh8ue";
pub const SCOPE: &str = "read";
pub const REFRESH_TOKEN: &str = "4f22e6c7-f8d6-48b0-8f2e-64f08fe0b5a6";
pub const AUTH_CODE: &str = "Moh3uag5";
pub const USERNAME: &str = "flynn";
pub const SUCCESS_URI: &str = "/success";

/// Everything a test module shares. Ports are allocated once; the
/// simulators are restarted per test with different overrides.
pub struct TestEnvironment {
    pub proxy_port: u16,
    pub auth_server_port: u16,
    pub resource_provider_port: u16,
    pub client: ClientRegistration,
    pub grant: GrantState,
    pub success_uri: String,
    dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Result<Self> {
        let proxy_port = free_tcp_port()?;
        let auth_server_port = free_tcp_port()?;
        let resource_provider_port = free_tcp_port()?;

        let client = ClientRegistration {
            client_id: CLIENT_ID.to_string(),
            client_secret: CLIENT_SECRET.into(),
            client_secret_file: None,
            scope: SCOPE.to_string(),
            redirect_uri: format!("https://127.0.0.1:{proxy_port}/_oauth/callback"),
        };
        let grant = GrantState {
            access_token: ACCESS_TOKENS[0].to_string(),
            refresh_token: REFRESH_TOKEN.to_string(),
            auth_code: AUTH_CODE.to_string(),
            username: USERNAME.to_string(),
            approve_request: true,
            expires_in: 3600,
        };

        Ok(Self {
            proxy_port,
            auth_server_port,
            resource_provider_port,
            client,
            grant,
            success_uri: SUCCESS_URI.to_string(),
            dir: tempfile::Builder::new().prefix("oauth-it-").tempdir()?,
        })
    }

    /// Scratch directory for rendered configs; removed on drop.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn proxy_base_uri(&self) -> String {
        format!("https://127.0.0.1:{}", self.proxy_port)
    }

    pub fn auth_server_base_uri(&self) -> String {
        format!("http://127.0.0.1:{}", self.auth_server_port)
    }

    pub fn resource_provider_base_uri(&self) -> String {
        format!("http://127.0.0.1:{}", self.resource_provider_port)
    }

    pub fn authorization_url(&self) -> String {
        format!("{}/authorize", self.auth_server_base_uri())
    }

    /// Base configuration with one merged override layer applied.
    pub fn auth_server_config(&self, overrides: ConfigOverrides) -> AuthServerConfig {
        let mut config = AuthServerConfig::new(self.client.clone(), self.grant.clone());
        config.listen_addr = SocketAddr::from((Ipv4Addr::LOCALHOST, self.auth_server_port));
        config.with_overrides(overrides)
    }

    /// Resource provider config accepting the access token the
    /// authorization server issues under the same `overrides`.
    pub fn resource_provider_config(&self, overrides: ConfigOverrides) -> ResourceProviderConfig {
        let mut config = ResourceProviderConfig::new(self.grant.access_token.clone());
        config.listen_addr = SocketAddr::from((Ipv4Addr::LOCALHOST, self.resource_provider_port));
        config.with_overrides(overrides)
    }

    /// Variables for the proxy config template; `extra` wins on conflicts.
    pub fn template_vars(&self, extra: BTreeMap<String, String>) -> BTreeMap<String, String> {
        let base = BTreeMap::from([
            ("port".to_string(), self.proxy_port.to_string()),
            ("client_id".to_string(), self.client.client_id.clone()),
            (
                "client_secret".to_string(),
                self.client.client_secret.expose().clone(),
            ),
            ("scope".to_string(), self.client.scope.clone()),
            ("redirect_uri".to_string(), self.client.redirect_uri.clone()),
            ("oaas_uri".to_string(), self.auth_server_base_uri()),
            ("authorization_url".to_string(), self.authorization_url()),
            ("success_uri".to_string(), self.success_uri.clone()),
            ("rp_uri".to_string(), self.resource_provider_base_uri()),
        ]);
        merge_maps([base, extra])
    }

    /// Fresh browser-like client pointed at the proxy.
    pub fn http_client(&self) -> Result<HttpClient> {
        HttpClient::new(&self.proxy_base_uri())
    }
}
