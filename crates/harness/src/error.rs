//! Harness errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("template error: {0}")]
    Template(String),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("response {status} from {url} has no Location header")]
    MissingLocation { status: u16, url: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Supervisor(#[from] supervisor::Error),

    #[error(transparent)]
    Config(#[from] common::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supervisor_errors_pass_through_unchanged() {
        let err: Error = supervisor::Error::StartupFailure {
            target: "proxy".into(),
            last_error: "connection refused".into(),
        }
        .into();
        assert_eq!(err.to_string(), "proxy failed to start: connection refused");
    }

    #[test]
    fn template_error_is_prefixed() {
        let err = Error::Template("unknown variable: port".into());
        assert_eq!(err.to_string(), "template error: unknown variable: port");
    }
}
