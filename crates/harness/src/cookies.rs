//! Inspectable cookie jar for a single-origin test client
//!
//! The proxy under test is the only origin the client talks to with
//! cookies, so the jar keys cookies by name and ignores Domain/Path.
//! A `Set-Cookie` with `Max-Age<=0`, an `Expires` in the past, or an
//! empty value removes the cookie.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use cookie::Cookie;
use reqwest::Url;
use reqwest::cookie::CookieStore;
use reqwest::header::HeaderValue;

/// A parsed `Set-Cookie` header: name, value and the attributes that
/// decide whether it deletes the cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    pub max_age: Option<i64>,
    /// Unix seconds
    pub expires: Option<i64>,
}

impl SetCookie {
    /// Parse one header value. `Expires` accepts every date form RFC 6265
    /// allows, including `01-Jan-1970` and two-digit years.
    pub fn parse(header: &str) -> Option<Self> {
        let cookie = Cookie::parse(header).ok()?;
        Some(SetCookie {
            name: cookie.name().to_string(),
            value: cookie.value_trimmed().to_string(),
            max_age: cookie.max_age().map(|age| age.whole_seconds()),
            expires: cookie.expires_datetime().map(|at| at.unix_timestamp()),
        })
    }

    /// True when storing this cookie means deleting it.
    pub fn is_removal(&self, now: SystemTime) -> bool {
        if self.value.is_empty() {
            return true;
        }
        // Max-Age takes precedence over Expires
        if let Some(max_age) = self.max_age {
            return max_age <= 0;
        }
        match self.expires {
            Some(expires) => {
                let now = now
                    .duration_since(UNIX_EPOCH)
                    .map_or(0, |d| d.as_secs() as i64);
                expires <= now
            }
            None => false,
        }
    }
}

#[derive(Debug, Default)]
pub struct CookieJar {
    cookies: RwLock<BTreeMap<String, String>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, String>> {
        self.cookies.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, String>> {
        self.cookies.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.read().get(name).cloned()
    }

    pub fn insert(&self, name: impl Into<String>, value: impl Into<String>) {
        self.write().insert(name.into(), value.into());
    }

    pub fn remove(&self, name: &str) -> Option<String> {
        self.write().remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.read().clone()
    }

    /// Apply one `Set-Cookie` header value.
    pub fn store(&self, header: &str, now: SystemTime) {
        let Some(cookie) = SetCookie::parse(header) else {
            tracing::debug!(header, "ignoring malformed Set-Cookie");
            return;
        };
        if cookie.is_removal(now) {
            self.write().remove(&cookie.name);
        } else {
            self.write().insert(cookie.name, cookie.value);
        }
    }
}

impl CookieStore for CookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, _url: &Url) {
        let now = SystemTime::now();
        for header in cookie_headers {
            if let Ok(text) = header.to_str() {
                self.store(text, now);
            }
        }
    }

    fn cookies(&self, _url: &Url) -> Option<HeaderValue> {
        let cookies = self.read();
        if cookies.is_empty() {
            return None;
        }
        let header = cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        HeaderValue::from_str(&header).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn url() -> Url {
        Url::parse("https://127.0.0.1:8443/").unwrap()
    }

    #[test]
    fn parses_name_value_and_attributes() {
        let cookie =
            SetCookie::parse("oauth_access_token=abc; Path=/; Max-Age=3600; Secure; HttpOnly")
                .unwrap();
        assert_eq!(cookie.name, "oauth_access_token");
        assert_eq!(cookie.value, "abc");
        assert_eq!(cookie.max_age, Some(3600));
        assert_eq!(cookie.expires, None);
    }

    #[test]
    fn value_may_contain_equals_signs() {
        let cookie = SetCookie::parse("oauth_refresh_token=YWJj==; Path=/").unwrap();
        assert_eq!(cookie.value, "YWJj==");
    }

    #[test]
    fn malformed_headers_are_rejected() {
        assert!(SetCookie::parse("no-equals-sign").is_none());
        assert!(SetCookie::parse("=value").is_none());
    }

    #[test]
    fn expires_accepts_every_cookie_date_form() {
        let expires = |h: &str| SetCookie::parse(h).unwrap().expires;

        assert_eq!(expires("a=x; Expires=Thu, 01 Jan 1970 00:00:00 GMT"), Some(0));
        assert_eq!(
            expires("a=x; Expires=Sun, 06 Nov 1994 08:49:37 GMT"),
            Some(784_111_777)
        );
        assert_eq!(
            expires("a=x; Expires=Tue, 29 Feb 2028 12:00:00 GMT"),
            Some(1_835_438_400)
        );
        assert_eq!(expires("a=x; Expires=Thu, 01-Jan-1970 00:00:01 GMT"), Some(1));
        assert_eq!(expires("a=x; Expires=Thursday, 01-Jan-70 00:00:01 GMT"), Some(1));
        assert_eq!(expires("a=x; Expires=yesterday"), None);
    }

    #[test]
    fn negative_max_age_means_delete_now() {
        let cookie = SetCookie::parse("a=x; Max-Age=-1").unwrap();
        assert_eq!(cookie.max_age, Some(0));
    }

    #[test]
    fn removal_rules() {
        let now = UNIX_EPOCH + Duration::from_secs(1_000_000);
        let removal = |h: &str| SetCookie::parse(h).unwrap().is_removal(now);

        assert!(removal("a=x; Max-Age=0"));
        assert!(removal("a=x; Max-Age=-1"));
        assert!(removal("a=; Path=/"));
        assert!(removal("a=x; Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
        assert!(!removal("a=x"));
        assert!(!removal("a=x; Max-Age=10; Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
        assert!(!removal("a=x; Expires=Fri, 01 Jan 2100 00:00:00 GMT"));
    }

    #[test]
    fn jar_applies_sets_and_deletions() {
        let jar = CookieJar::new();
        let headers = [
            HeaderValue::from_static("oauth_access_token=t0; Path=/"),
            HeaderValue::from_static("oauth_refresh_token=r0; Path=/"),
            HeaderValue::from_static("oauth_username=flynn; Path=/"),
        ];
        jar.set_cookies(&mut headers.iter(), &url());
        assert_eq!(jar.len(), 3);
        assert_eq!(jar.get("oauth_username").as_deref(), Some("flynn"));

        let clear = [
            HeaderValue::from_static("oauth_access_token=; Max-Age=0"),
            HeaderValue::from_static("oauth_refresh_token=deleted; Max-Age=0"),
        ];
        jar.set_cookies(&mut clear.iter(), &url());
        assert_eq!(jar.len(), 1);
        assert!(!jar.contains("oauth_access_token"));
    }

    #[test]
    fn jar_drops_cookies_expired_in_legacy_date_forms() {
        let jar = CookieJar::new();
        jar.insert("oauth_access_token", "t0");
        jar.insert("oauth_username", "flynn");
        jar.insert("oauth_refresh_token", "r0");

        let clear = [
            HeaderValue::from_static(
                "oauth_access_token=deleted; Expires=Thu, 01-Jan-1970 00:00:01 GMT",
            ),
            HeaderValue::from_static(
                "oauth_username=deleted; Expires=Thursday, 01-Jan-70 00:00:01 GMT",
            ),
        ];
        jar.set_cookies(&mut clear.iter(), &url());

        assert_eq!(
            jar.snapshot(),
            BTreeMap::from([("oauth_refresh_token".to_string(), "r0".to_string())])
        );
    }

    #[test]
    fn jar_sends_all_cookies_in_one_header() {
        let jar = CookieJar::new();
        assert!(jar.cookies(&url()).is_none());

        jar.insert("b", "2");
        jar.insert("a", "1");
        assert_eq!(jar.cookies(&url()).unwrap(), "a=1; b=2");

        assert_eq!(jar.remove("a").as_deref(), Some("1"));
        jar.clear();
        assert!(jar.is_empty());
    }
}
