//! Health-check configuration and a single probe

use std::time::Duration;

use crate::lifecycle::RetryBudget;

/// Default number of probes before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 20;

/// Default delay between probes.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// Where and how hard to poll a freshly started target.
///
/// The budget is configurable because compiled servers (e.g. the reverse
/// proxy) can take noticeably longer to bind than a simulator.
#[derive(Debug, Clone)]
pub struct HealthCheck {
    pub url: String,
    pub max_attempts: u32,
    pub interval: Duration,
    /// Per-probe timeout so a target that accepts but never answers still
    /// consumes the budget
    pub request_timeout: Duration,
    /// The proxy terminates TLS with a self-signed certificate in test mode
    pub accept_invalid_certs: bool,
    /// When false any HTTP response counts as healthy
    pub require_success: bool,
}

impl HealthCheck {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            accept_invalid_certs: true,
            require_success: true,
        }
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn require_success(mut self, require: bool) -> Self {
        self.require_success = require;
        self
    }

    pub fn budget(&self) -> RetryBudget {
        RetryBudget {
            max_attempts: self.max_attempts,
            interval: self.interval,
        }
    }

    /// Client used for probing. Redirects are followed, matching how a
    /// browser would see the target's health URL.
    pub fn client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .timeout(self.request_timeout)
            .build()
    }
}

/// Issue one probe. `Err` carries a human-readable reason.
pub async fn probe(client: &reqwest::Client, check: &HealthCheck) -> Result<(), String> {
    let response = client
        .get(&check.url)
        .send()
        .await
        .map_err(|e| format!("GET {}: {e}", check.url))?;

    let status = response.status();
    if check.require_success && !status.is_success() {
        return Err(format!("GET {} returned {status}", check.url));
    }
    Ok(())
}
