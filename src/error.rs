//! Error types
use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Fail)]
pub enum Error {
    /// Channel fault while a command or sweep was in flight. The session
    /// should be treated as dead: close it and reconnect manually.
    #[fail(display = "I/O error: {}", _0)]
    Io(io::Error),
    /// The port could not be opened or configured, or the device never
    /// produced its startup banner.
    #[fail(display = "connection error: {}", _0)]
    Connection(String),
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error::Io(e)
    }
}

impl From<String> for Error {
    fn from(e: String) -> Error {
        Error::Connection(e)
    }
}
