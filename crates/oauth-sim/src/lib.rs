//! Protocol-accurate OAuth2 test doubles
//!
//! Two routers, each built from an immutable configuration value:
//! 1. [`authorization_server::router`]: `/authorize`, `/token`,
//!    `/userinfo` implementing the authorization-code and refresh-token
//!    grants against a single client registration and grant state
//! 2. [`resource_provider::router`]: a bearer-protected `/ping`
//!
//! All rejections are [`OAuthError`] variants serialized as
//! `{"error", "error_description"}` with a fixed status per variant.
//! Per-test variation comes from [`ConfigOverrides`] layers applied before
//! the router is built; a fresh router (or process) is used per test.

pub mod authorization_server;
pub mod config;
pub mod credentials;
pub mod error;
pub mod resource_provider;
pub mod token;

pub use config::{
    AuthServerConfig, ClientRegistration, ConfigOverrides, GrantState, ResourceProviderConfig,
};
pub use error::{ErrorBody, OAuthError};
pub use token::IssuedToken;
