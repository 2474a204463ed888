//! Error types for RedBloom.

use std::io;
use thiserror::Error;

/// The result type used throughout RedBloom.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for RedBloom operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A bit offset fell outside `[0, width)`.
    ///
    /// This is a configuration or programming error, never a transient fault.
    /// It is raised before anything is sent to the backing store.
    #[error("Offset out of range: {offset} >= width {width}")]
    OffsetOutOfRange {
        /// The offending offset.
        offset: u64,
        /// The width of the bit array.
        width: u64,
    },

    /// An invalid argument or configuration value was provided.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The Redis client reported an error (connection, auth, or server reply).
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A pooled connection could not be acquired.
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// A command was rejected by the in-memory store.
    #[error("Command error: {0}")]
    Command(String),

    /// A server-side script failed to compile, raised an error, or timed out.
    #[error("Script error: {0}")]
    Script(String),

    /// The store returned a reply of a shape the caller cannot interpret.
    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),

    /// A configuration file could not be parsed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Creates a new invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Creates a new command error.
    pub fn command(msg: impl Into<String>) -> Self {
        Error::Command(msg.into())
    }

    /// Creates a new script error.
    pub fn script(msg: impl Into<String>) -> Self {
        Error::Script(msg.into())
    }

    /// Creates a new unexpected reply error.
    pub fn unexpected_reply(msg: impl Into<String>) -> Self {
        Error::UnexpectedReply(msg.into())
    }

    /// Returns true if the error came from reaching or talking to the store.
    ///
    /// These are the errors a caller may want to retry; RedBloom never does.
    pub fn is_connectivity(&self) -> bool {
        match self {
            Error::Pool(_) => true,
            Error::Redis(e) => e.is_io_error() || e.is_connection_refusal() || e.is_timeout(),
            _ => false,
        }
    }

    /// Returns true if the error is an out-of-range bit offset.
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, Error::OffsetOutOfRange { .. })
    }
}

impl From<mlua::Error> for Error {
    fn from(err: mlua::Error) -> Self {
        Error::Script(err.to_string())
    }
}
