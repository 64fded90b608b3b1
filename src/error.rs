//! Crate-wide error type.

use thiserror::Error;

/// Errors surfaced by panels, transports and the settings store.
///
/// Connection failures reported by a transport are *not* errors in this sense:
/// they arrive as lifecycle events and move the tracker into
/// [`ConnectionStatus::Error`](crate::lifecycle::ConnectionStatus::Error).
#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serial port error: {0}")]
    Serial(String),

    #[error("midi error: {0}")]
    Midi(String),

    #[error("config error: {0}")]
    Config(String),

    /// A message payload had no bytes to decode.
    #[error("empty message payload")]
    EmptyMessage,

    #[error("{0} is not connected")]
    NotConnected(&'static str),

    #[error("unknown device `{0}`")]
    UnknownDevice(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(feature = "serial")]
impl From<serialport::Error> for Error {
    fn from(e: serialport::Error) -> Self {
        Error::Serial(e.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config(e.to_string())
    }
}
