//! Simulated protected resource API
//!
//! `GET /` is the health check; `GET /ping` answers `{"pong":"ok"}` only for
//! the configured access token, using the same bearer rule as `/userinfo`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::config::ResourceProviderConfig;
use crate::credentials::require_bearer;
use crate::error::OAuthError;

pub fn router(config: ResourceProviderConfig) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/ping", get(ping))
        .with_state(Arc::new(config))
}

async fn root() -> &'static str {
    "OK"
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pong {
    pub pong: String,
}

#[instrument(skip_all, name = "ping")]
async fn ping(
    State(config): State<Arc<ResourceProviderConfig>>,
    headers: HeaderMap,
) -> Result<Json<Pong>, OAuthError> {
    require_bearer(&headers, &config.access_token).inspect_err(|e| {
        warn!(error = %e, "ping rejected");
    })?;

    Ok(Json(Pong { pong: "ok".into() }))
}
