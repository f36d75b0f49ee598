//! Types shared by the OAuth2 simulators, the process supervisor and the
//! test harness

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
