//! Simulated OAuth2 authorization server
//!
//! Endpoints:
//! - GET  /: health check, always 200
//! - GET  /authorize: validates the client and bounces back to `redirect_uri`
//!   with either `code=<auth_code>` or `error=invalid_scope`
//! - POST /token: `authorization_code` and `refresh_token` grants,
//!   client authenticated with HTTP Basic
//! - GET  /userinfo: bearer protected, returns `{"username": ...}`
//!
//! Every request is evaluated against the immutable [`AuthServerConfig`]
//! the router was built with. The authorization code is deliberately not
//! invalidated after redemption, so one configured code can be exchanged
//! any number of times.

use std::sync::Arc;

use axum::extract::rejection::{FormRejection, QueryRejection};
use axum::extract::{Form, Query, State};
use axum::http::HeaderMap;
use axum::response::Redirect;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::AuthServerConfig;
use crate::credentials::{authorization_header, parse_basic, require_bearer};
use crate::error::OAuthError;
use crate::token::IssuedToken;

type SharedConfig = Arc<AuthServerConfig>;

/// Build the authorization server router around one configuration.
pub fn router(config: AuthServerConfig) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/authorize", get(authorize))
        .route("/token", post(token))
        .route("/userinfo", get(userinfo))
        .with_state(Arc::new(config))
}

async fn root() -> &'static str {
    "OK"
}

/// Query parameters of `GET /authorize`. Absent parameters read as empty.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AuthorizeParams {
    pub response_type: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub state: String,
}

/// Decide where `/authorize` sends the user agent.
///
/// Checked in order: client id (401 `invalid_client`), response type
/// (400 `unsupported_response_type`), redirect URI (400 `invalid_grant`).
/// Past those checks the answer is always a redirect: `code` when the
/// request is approved and the scope is registered, `error=invalid_scope`
/// otherwise. A non-empty `state` is echoed either way.
pub fn authorize_location(
    config: &AuthServerConfig,
    params: &AuthorizeParams,
) -> Result<String, OAuthError> {
    let client = &config.client;

    if params.client_id != client.client_id {
        return Err(OAuthError::InvalidClient(format!(
            "Invalid client_id: {}",
            params.client_id
        )));
    }

    if params.response_type != "code" {
        return Err(OAuthError::UnsupportedResponseType(format!(
            "Unsupported response type: {}",
            params.response_type
        )));
    }

    if params.redirect_uri != client.redirect_uri {
        return Err(OAuthError::InvalidGrant(format!(
            "Invalid redirect {} does not match {}",
            params.redirect_uri, client.redirect_uri
        )));
    }

    let mut query = url::form_urlencoded::Serializer::new(String::new());
    if config.grant.approve_request && client.allows_scope(&params.scope) {
        query.append_pair("code", &config.grant.auth_code);
    } else {
        query.append_pair("error", "invalid_scope");
    }
    if !params.state.is_empty() {
        query.append_pair("state", &params.state);
    }

    let separator = if params.redirect_uri.contains('?') { '&' } else { '?' };
    Ok(format!(
        "{}{separator}{}",
        params.redirect_uri,
        query.finish()
    ))
}

#[instrument(skip_all, name = "authorize")]
async fn authorize(
    State(config): State<SharedConfig>,
    query: Result<Query<AuthorizeParams>, QueryRejection>,
) -> Result<Redirect, OAuthError> {
    let Query(params) =
        query.map_err(|e| OAuthError::InvalidRequest(format!("Malformed query: {e}")))?;

    match authorize_location(&config, &params) {
        Ok(location) => {
            info!(
                client_id = %params.client_id,
                scope = %params.scope,
                approved = config.grant.approve_request,
                "authorization redirect"
            );
            Ok(Redirect::to(&location))
        }
        Err(e) => {
            warn!(client_id = %params.client_id, error = %e, "authorization rejected");
            Err(e)
        }
    }
}

/// Form body of `POST /token`.
#[derive(Debug, Default, Deserialize)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub refresh_token: Option<String>,
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|v| !v.is_empty())
}

/// Dispatch on `grant_type` once the client has been authenticated.
pub fn exchange(config: &AuthServerConfig, request: &TokenRequest) -> Result<IssuedToken, OAuthError> {
    match present(&request.grant_type) {
        Some("authorization_code") => {
            let (Some(code), Some(_redirect_uri)) =
                (present(&request.code), present(&request.redirect_uri))
            else {
                return Err(OAuthError::InvalidRequest(
                    "Missing code or redirect_uri".into(),
                ));
            };

            if code != config.grant.auth_code {
                return Err(OAuthError::InvalidGrant(format!(
                    "Invalid authorization code: {code}"
                )));
            }

            Ok(IssuedToken::for_authorization_code(config))
        }
        Some("refresh_token") => {
            let Some(refresh_token) = present(&request.refresh_token) else {
                return Err(OAuthError::InvalidRequest("Missing refresh_token".into()));
            };

            if refresh_token != config.grant.refresh_token {
                return Err(OAuthError::InvalidGrant(format!(
                    "Invalid refresh token: {refresh_token}"
                )));
            }

            Ok(IssuedToken::for_refresh(config))
        }
        _ => Err(OAuthError::InvalidRequest(
            "Missing or invalid grant type".into(),
        )),
    }
}

#[instrument(skip_all, name = "token")]
async fn token(
    State(config): State<SharedConfig>,
    headers: HeaderMap,
    form: Result<Form<TokenRequest>, FormRejection>,
) -> Result<Json<IssuedToken>, OAuthError> {
    let header = authorization_header(&headers)?;
    let credentials = parse_basic(header)?;

    if credentials.client_id != config.client.client_id
        || !config.client.client_secret.matches(&credentials.client_secret)
    {
        warn!(client_id = %credentials.client_id, "client authentication failed");
        return Err(OAuthError::Unauthorized("Bad credentials".into()));
    }

    let request = match form {
        Ok(Form(request)) => request,
        Err(e) => {
            debug!(error = %e, "unreadable token request body");
            TokenRequest::default()
        }
    };

    let grant_type = request.grant_type.as_deref().unwrap_or_default();
    match exchange(&config, &request) {
        Ok(issued) => {
            info!(grant_type, "token issued");
            Ok(Json(issued))
        }
        Err(e) => {
            warn!(grant_type, error = %e, "token request rejected");
            Err(e)
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserInfo {
    pub username: String,
}

#[instrument(skip_all, name = "userinfo")]
async fn userinfo(
    State(config): State<SharedConfig>,
    headers: HeaderMap,
) -> Result<Json<UserInfo>, OAuthError> {
    require_bearer(&headers, &config.grant.access_token).inspect_err(|e| {
        warn!(error = %e, "userinfo rejected");
    })?;

    Ok(Json(UserInfo {
        username: config.grant.username.clone(),
    }))
}
