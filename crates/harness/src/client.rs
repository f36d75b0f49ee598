//! HTTP client playing the browser against the proxy under test
//!
//! Relative URIs resolve against the base URI, redirects are not followed
//! (tests assert on `Location`), TLS certificates are not verified, and
//! all requests share one [`CookieJar`] that tests can inspect and edit.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::SystemTime;

use reqwest::header::SET_COOKIE;
use reqwest::redirect::Policy;
use reqwest::{Method, RequestBuilder, Response, Url};

use crate::cookies::{CookieJar, SetCookie};
use crate::error::{Error, Result};

pub struct HttpClient {
    base: Url,
    jar: Arc<CookieJar>,
    manual: reqwest::Client,
    following: reqwest::Client,
}

impl HttpClient {
    pub fn new(base_uri: &str) -> Result<Self> {
        let base = Url::parse(base_uri)?;
        let jar = Arc::new(CookieJar::new());
        let builder = || {
            reqwest::Client::builder()
                .danger_accept_invalid_certs(true)
                .cookie_provider(Arc::clone(&jar))
        };
        Ok(Self {
            base,
            manual: builder().redirect(Policy::none()).build()?,
            following: builder().build()?,
            jar,
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.jar
    }

    /// Resolve `uri` against the base; absolute URIs pass through.
    pub fn url(&self, uri: &str) -> Result<Url> {
        Ok(self.base.join(uri)?)
    }

    /// Request builder that does not follow redirects.
    pub fn request(&self, method: Method, uri: &str) -> Result<RequestBuilder> {
        Ok(self.manual.request(method, self.url(uri)?))
    }

    /// Request builder that follows redirects, collecting cookies on the way.
    pub fn request_following(&self, method: Method, uri: &str) -> Result<RequestBuilder> {
        Ok(self.following.request(method, self.url(uri)?))
    }

    pub async fn get(&self, uri: &str) -> Result<Response> {
        Ok(self.request(Method::GET, uri)?.send().await?)
    }

    pub async fn post(&self, uri: &str) -> Result<Response> {
        Ok(self.request(Method::POST, uri)?.send().await?)
    }

    pub async fn send_following(&self, method: Method, uri: &str) -> Result<Response> {
        Ok(self.request_following(method, uri)?.send().await?)
    }

    /// Follow the `Location` of a redirect response.
    pub async fn follow(&self, response: &Response) -> Result<Response> {
        let location = location(response).ok_or_else(|| Error::MissingLocation {
            status: response.status().as_u16(),
            url: response.url().to_string(),
        })?;
        let target = response.url().join(location)?;
        self.get(target.as_str()).await
    }
}

pub fn location(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
}

/// Cookies set by this response alone, deletions excluded.
pub fn response_cookies(response: &Response) -> BTreeMap<String, String> {
    let now = SystemTime::now();
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(SetCookie::parse)
        .filter(|c| !c.is_removal(now))
        .map(|c| (c.name, c.value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::{HeaderMap, StatusCode, header};
    use axum::response::{AppendHeaders, IntoResponse, Redirect};
    use axum::routing::{get, post};
    use tokio::net::TcpListener;

    async fn login() -> impl IntoResponse {
        (
            AppendHeaders([
                (header::SET_COOKIE, "oauth_access_token=t0; Path=/"),
                (header::SET_COOKIE, "oauth_username=flynn; Path=/"),
            ]),
            Redirect::to("/success"),
        )
    }

    async fn logout() -> impl IntoResponse {
        (
            StatusCode::NO_CONTENT,
            AppendHeaders([
                (header::SET_COOKIE, "oauth_access_token=; Max-Age=0"),
                (header::SET_COOKIE, "oauth_username=; Max-Age=0"),
            ]),
        )
    }

    async fn echo_cookies(headers: HeaderMap) -> String {
        headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    async fn serve() -> String {
        let app = Router::new()
            .route("/login", post(login))
            .route("/logout", post(logout))
            .route("/success", get(echo_cookies));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn relative_and_absolute_uris_resolve() {
        let client = HttpClient::new("https://127.0.0.1:8443").unwrap();
        assert_eq!(
            client.url("/_oauth/login").unwrap().as_str(),
            "https://127.0.0.1:8443/_oauth/login"
        );
        assert_eq!(
            client.url("http://127.0.0.1:9000/authorize?x=1").unwrap().as_str(),
            "http://127.0.0.1:9000/authorize?x=1"
        );
        assert!(HttpClient::new("not a url").is_err());
    }

    #[tokio::test]
    async fn redirects_are_not_followed_but_cookies_are_kept() {
        let client = HttpClient::new(&serve().await).unwrap();

        let resp = client.post("/login").await.unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&resp), Some("/success"));

        let set = response_cookies(&resp);
        assert_eq!(set.get("oauth_access_token").map(String::as_str), Some("t0"));
        assert_eq!(client.cookies().len(), 2);

        let page = client.follow(&resp).await.unwrap();
        let sent = page.text().await.unwrap();
        assert!(sent.contains("oauth_access_token=t0"), "got: {sent}");
        assert!(sent.contains("oauth_username=flynn"), "got: {sent}");
    }

    #[tokio::test]
    async fn following_variant_lands_on_final_page() {
        let client = HttpClient::new(&serve().await).unwrap();
        let resp = client.send_following(Method::POST, "/login").await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.url().path(), "/success");
        assert_eq!(client.cookies().len(), 2);
    }

    #[tokio::test]
    async fn deletions_empty_the_jar_and_are_not_reported_as_set() {
        let client = HttpClient::new(&serve().await).unwrap();
        client.post("/login").await.unwrap();

        let resp = client.post("/logout").await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert!(response_cookies(&resp).is_empty());
        assert!(client.cookies().is_empty());
    }

    #[tokio::test]
    async fn edited_jar_is_what_gets_sent() {
        let client = HttpClient::new(&serve().await).unwrap();
        client.post("/login").await.unwrap();
        client.cookies().remove("oauth_access_token");
        client.cookies().insert("oauth_refresh_token", "invalid-token");

        let sent = client.get("/success").await.unwrap().text().await.unwrap();
        assert!(!sent.contains("oauth_access_token"), "got: {sent}");
        assert!(sent.contains("oauth_refresh_token=invalid-token"), "got: {sent}");
    }
}
