//! Error types for segview

use std::fmt;

/// Result type alias for segview operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for segview
#[derive(Debug)]
pub enum Error {
    /// Membership transport errors (subscription, delivery)
    Transport(String),
    /// Lookup against a data source that has never been observed
    UnknownDataSource(String),
    /// No candidate server is available for a segment
    NoReplicaAvailable(String),
    /// Structural corruption of the index
    InvariantViolation(String),
    /// Configuration errors
    Config(String),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Transport(msg) => write!(f, "Transport error: {}", msg),
            Error::UnknownDataSource(ds) => write!(f, "Unknown data source: {}", ds),
            Error::NoReplicaAvailable(segment) => {
                write!(f, "No replica available for segment: {}", segment)
            }
            Error::InvariantViolation(msg) => write!(f, "Invariant violation: {}", msg),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}
