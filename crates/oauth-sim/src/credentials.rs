//! `Authorization` header parsing shared by both simulators
//!
//! Bearer validation is the one rule the authorization server's
//! `/userinfo` and the resource provider's `/ping` have in common.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::OAuthError;

/// Return the raw `Authorization` header, or `unauthorized` when absent.
pub fn authorization_header(headers: &HeaderMap) -> Result<&str, OAuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(OAuthError::authentication_required)?;
    value
        .to_str()
        .map_err(|_| OAuthError::InvalidRequest("Authorization header is not valid ASCII".into()))
}

/// Split `"<scheme> <credentials>"`.
fn split_scheme(header: &str) -> Option<(&str, &str)> {
    let (scheme, credentials) = header.split_once(' ')?;
    let credentials = credentials.trim();
    if credentials.is_empty() || credentials.contains(' ') {
        return None;
    }
    Some((scheme, credentials))
}

/// Require `Authorization: Bearer <expected>`.
///
/// Missing header -> `unauthorized`; another scheme, a malformed value or a
/// token that is not byte-for-byte the expected one -> `invalid_token`.
pub fn require_bearer(headers: &HeaderMap, expected: &str) -> Result<(), OAuthError> {
    let header = authorization_header(headers)
        .map_err(|e| match e {
            OAuthError::InvalidRequest(d) => OAuthError::InvalidToken(d),
            other => other,
        })?;

    let Some((scheme, token)) = split_scheme(header) else {
        return Err(OAuthError::InvalidToken(format!(
            "Malformed authorization header: {header}"
        )));
    };

    if scheme != "Bearer" {
        return Err(OAuthError::InvalidToken(format!(
            "Invalid authorization method: {scheme}"
        )));
    }

    if token != expected {
        return Err(OAuthError::InvalidToken(format!(
            "Invalid access token: {token}"
        )));
    }

    Ok(())
}

/// Client credentials presented with HTTP Basic authentication.
#[derive(Debug, PartialEq, Eq)]
pub struct BasicCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Decode `Basic base64(client_id:client_secret)`.
///
/// Any scheme other than `Basic`, invalid base64 or a missing `:` is an
/// `invalid_request`. The header must already be known to be present.
pub fn parse_basic(header: &str) -> Result<BasicCredentials, OAuthError> {
    let Some((scheme, encoded)) = split_scheme(header) else {
        return Err(OAuthError::InvalidRequest(format!(
            "Malformed authorization header: {header}"
        )));
    };

    if scheme != "Basic" {
        return Err(OAuthError::InvalidRequest(format!(
            "Invalid authorization method: {scheme}"
        )));
    }

    let decoded = STANDARD
        .decode(encoded)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or_else(|| OAuthError::InvalidRequest("Malformed client credentials".into()))?;

    let (client_id, client_secret) = decoded
        .split_once(':')
        .ok_or_else(|| OAuthError::InvalidRequest("Malformed client credentials".into()))?;

    Ok(BasicCredentials {
        client_id: client_id.to_owned(),
        client_secret: client_secret.to_owned(),
    })
}

/// Build a `Basic` header value; used by clients of the simulator.
pub fn basic_header(client_id: &str, client_secret: &str) -> String {
    format!(
        "Basic {}",
        STANDARD.encode(format!("{client_id}:{client_secret}"))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_accepts_exact_token() {
        assert_eq!(require_bearer(&headers_with("Bearer T1"), "T1"), Ok(()));
    }

    #[test]
    fn bearer_missing_header_is_unauthorized() {
        let err = require_bearer(&HeaderMap::new(), "T1").unwrap_err();
        assert_eq!(err.code(), "unauthorized");
        assert_eq!(err.status().as_u16(), 401);
    }

    #[test]
    fn bearer_wrong_token_is_invalid_token() {
        let err = require_bearer(&headers_with("Bearer wrong"), "T1").unwrap_err();
        assert_eq!(err, OAuthError::InvalidToken("Invalid access token: wrong".into()));
    }

    #[test]
    fn bearer_comparison_is_case_sensitive() {
        let err = require_bearer(&headers_with("Bearer t1"), "T1").unwrap_err();
        assert_eq!(err.code(), "invalid_token");
    }

    #[test]
    fn bearer_other_scheme_is_invalid_token() {
        let err = require_bearer(&headers_with("Basic VDE="), "T1").unwrap_err();
        assert_eq!(err.code(), "invalid_token");
        assert!(err.description().contains("Basic"));
    }

    #[test]
    fn bearer_without_token_is_invalid_token() {
        for header in ["Bearer", "Bearer ", "Bearer a b"] {
            let err = require_bearer(&headers_with(header), "T1").unwrap_err();
            assert_eq!(err.code(), "invalid_token", "header: {header:?}");
            assert_eq!(err.status().as_u16(), 401);
        }
    }

    #[test]
    fn basic_round_trips_through_header() {
        let header = basic_header("client", "s3cret:with:colons");
        let creds = parse_basic(&header).unwrap();
        assert_eq!(creds.client_id, "client");
        assert_eq!(creds.client_secret, "s3cret:with:colons");
    }

    #[test]
    fn basic_rejects_other_scheme() {
        let err = parse_basic("Bearer abc").unwrap_err();
        assert_eq!(err.code(), "invalid_request");
        assert_eq!(err.status().as_u16(), 400);
    }

    #[test]
    fn basic_rejects_undecodable_credentials() {
        assert_eq!(parse_basic("Basic !!!").unwrap_err().code(), "invalid_request");
        // "nocolon" has no separator between id and secret
        let header = format!("Basic {}", STANDARD.encode("nocolon"));
        assert_eq!(parse_basic(&header).unwrap_err().code(), "invalid_request");
    }
}
