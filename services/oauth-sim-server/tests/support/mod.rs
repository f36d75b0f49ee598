#![allow(dead_code)]

use harness::{SimulatorLauncher, TestEnvironment};
use oauth_sim::AuthServerConfig;

pub const BIN: &str = env!("CARGO_BIN_EXE_oauth-sim-server");

pub fn launcher(env: &TestEnvironment) -> SimulatorLauncher {
    SimulatorLauncher::new(BIN, env.dir()).quiet()
}

/// Client for talking to the simulators directly; redirects are asserted,
/// not followed.
pub fn api_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

pub fn authorize_url(config: &AuthServerConfig, scope: &str, state: Option<&str>) -> url::Url {
    let mut params = vec![
        ("response_type", "code"),
        ("client_id", config.client.client_id.as_str()),
        ("redirect_uri", config.client.redirect_uri.as_str()),
        ("scope", scope),
    ];
    if let Some(state) = state {
        params.push(("state", state));
    }
    url::Url::parse_with_params(&format!("http://{}/authorize", config.listen_addr), &params)
        .unwrap()
}

pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .expect("response has no Location header")
        .to_str()
        .unwrap()
        .to_string()
}

#[cfg(unix)]
/// True while a process with this pid exists.
pub fn is_alive(pid: u32) -> bool {
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}
