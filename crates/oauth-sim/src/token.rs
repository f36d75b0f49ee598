//! Token endpoint response value
//!
//! Recomputed from the grant state on every call; nothing is persisted.

use serde::{Deserialize, Serialize};

use crate::config::AuthServerConfig;

/// Body returned by `POST /token` on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: String,
    /// Only present for the authorization-code grant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Seconds until the access token expires (delta, not absolute)
    pub expires_in: u64,
    pub scope: String,
}

impl IssuedToken {
    fn from_config(config: &AuthServerConfig, refresh_token: Option<String>) -> Self {
        Self {
            access_token: config.grant.access_token.clone(),
            token_type: "bearer".to_owned(),
            refresh_token,
            expires_in: config.grant.expires_in,
            scope: config.client.scope.clone(),
        }
    }

    /// Response to a redeemed authorization code: includes the refresh token.
    pub fn for_authorization_code(config: &AuthServerConfig) -> Self {
        Self::from_config(config, Some(config.grant.refresh_token.clone()))
    }

    /// Response to a refresh: the refresh token is not re-issued.
    pub fn for_refresh(config: &AuthServerConfig) -> Self {
        Self::from_config(config, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClientRegistration, GrantState};

    fn config() -> AuthServerConfig {
        AuthServerConfig::new(
            ClientRegistration {
                client_id: "client".into(),
                client_secret: "secret".into(),
                client_secret_file: None,
                scope: "read".into(),
                redirect_uri: "https://127.0.0.1/_oauth/callback".into(),
            },
            GrantState {
                access_token: "T1".into(),
                refresh_token: "R".into(),
                auth_code: "C1".into(),
                username: "flynn".into(),
                approve_request: true,
                expires_in: 3600,
            },
        )
    }

    #[test]
    fn authorization_code_token_serializes_all_fields() {
        let json = serde_json::to_value(IssuedToken::for_authorization_code(&config())).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "access_token": "T1",
                "token_type": "bearer",
                "refresh_token": "R",
                "expires_in": 3600,
                "scope": "read",
            })
        );
    }

    #[test]
    fn refresh_token_is_omitted_not_null() {
        let json = serde_json::to_string(&IssuedToken::for_refresh(&config())).unwrap();
        assert!(!json.contains("refresh_token"), "got: {json}");
        assert!(json.contains("\"access_token\":\"T1\""));
    }

    #[test]
    fn deserializes_without_refresh_token() {
        let json = r#"{"access_token":"T2","token_type":"bearer","expires_in":60,"scope":"read"}"#;
        let token: IssuedToken = serde_json::from_str(json).unwrap();
        assert_eq!(token.refresh_token, None);
        assert_eq!(token.expires_in, 60);
    }
}
