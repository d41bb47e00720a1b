use thiserror::Error;

/// Failures raised while setting up a run, before any item moves
#[derive(Error, Debug)]
pub enum Error {
    /// A setting is out of range or malformed; the message names it
    #[error("Configuration error: {0}")]
    Config(String),

    /// The global subscriber could not be installed or the filter is invalid
    #[error("Logging setup failed: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, Error>;
