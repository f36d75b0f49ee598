//! Integration test orchestration for an OAuth-fronting reverse proxy
//!
//! A [`TestEnvironment`] allocates the ports and holds the registered client
//! and grant state. [`SimulatorLauncher`] runs the authorization server and
//! resource provider as supervised processes (or in-process via
//! [`serve_authorization_server`] / [`serve_resource_provider`]),
//! [`ProxyLauncher`] renders the proxy config and starts the proxy, and
//! [`HttpClient`] drives the whole flow like a browser that never follows
//! redirects on its own.

pub mod client;
pub mod cookies;
pub mod environment;
pub mod error;
pub mod launcher;
pub mod merge;
pub mod ports;
pub mod template;

pub use client::{HttpClient, location, response_cookies};
pub use cookies::CookieJar;
pub use environment::TestEnvironment;
pub use error::{Error, Result};
pub use launcher::{
    ProxyLauncher, SimulatorLauncher, serve_authorization_server, serve_resource_provider,
};
pub use merge::merge_maps;
pub use ports::free_tcp_port;
pub use template::{render_template, render_template_file, write_file};
