//! Command line: `oauth-sim-server <authorization-server|resource-provider> [--config <path>]`

use std::path::PathBuf;

use oauth_sim::config::resolve_path;

pub const USAGE: &str =
    "usage: oauth-sim-server <authorization-server|resource-provider> [--config <path>]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Simulator {
    AuthorizationServer,
    ResourceProvider,
}

impl Simulator {
    pub fn name(self) -> &'static str {
        match self {
            Simulator::AuthorizationServer => "authorization-server",
            Simulator::ResourceProvider => "resource-provider",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct Cli {
    pub simulator: Simulator,
    pub config_path: PathBuf,
}

impl Cli {
    /// Parse `args` without the program name. The config path falls back to
    /// `OAUTH_SIM_CONFIG`, then `oauth-sim.toml`.
    pub fn parse<I, S>(args: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|a| a.as_ref().to_owned()).collect();

        let simulator = match args.first().map(String::as_str) {
            Some("authorization-server") => Simulator::AuthorizationServer,
            Some("resource-provider") => Simulator::ResourceProvider,
            Some(other) => return Err(format!("unknown simulator: {other}")),
            None => return Err("missing simulator".into()),
        };

        let mut cli_config_path = None;
        let mut rest = args[1..].iter();
        while let Some(arg) = rest.next() {
            match arg.as_str() {
                "--config" => match rest.next() {
                    Some(path) => cli_config_path = Some(path.as_str()),
                    None => return Err("--config needs a path".into()),
                },
                other => return Err(format!("unexpected argument: {other}")),
            }
        }

        Ok(Self {
            simulator,
            config_path: resolve_path(cli_config_path),
        })
    }
}
