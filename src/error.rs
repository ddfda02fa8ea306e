//! Error types of the analysis engine

use std::io;
use thiserror::Error;

/// Error type of the analysis engine
///
/// The distinction that matters most here is between transient failures,
/// which are worth retrying (see `is_transient`), and everything else, which
/// is reported immediately.
#[derive(Error, Debug)]
pub enum Error {
    /// Transient I/O failure while opening or reading an input file
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Input data that does not have the expected shape
    #[error("malformed batch: {0}")]
    MalformedBatch(String),

    /// JSON decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Inconsistent configuration
    #[error("configuration error: {0}")]
    Config(String),
}
//
impl Error {
    /// Truth that retrying the failed operation may succeed
    ///
    /// Timeouts, dropped connections and OS-level read failures are
    /// transient. Malformed data will stay malformed no matter how many times
    /// it is read, and so is a JSON syntax error in an input file.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Io(e) => !matches!(
                e.kind(),
                io::ErrorKind::NotFound
                    | io::ErrorKind::PermissionDenied
                    | io::ErrorKind::InvalidInput
                    | io::ErrorKind::InvalidData
                    | io::ErrorKind::Unsupported
            ),
            Error::MalformedBatch(_) | Error::Json(_) | Error::Config(_) => false,
        }
    }

    /// Short name of the error class, for failure reports
    pub fn class(&self) -> &'static str {
        match self {
            Error::Io(e) => match e.kind() {
                io::ErrorKind::TimedOut => "TimeoutError",
                io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionRefused
                | io::ErrorKind::ConnectionAborted => "ConnectionError",
                _ => "IoError",
            },
            Error::MalformedBatch(_) => "MalformedBatch",
            Error::Json(_) => "JsonError",
            Error::Config(_) => "ConfigError",
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
