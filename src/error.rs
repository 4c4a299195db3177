//! Infrastructure error type.

use std::net::AddrParseError;
use std::num::ParseIntError;

/// The error type returned by restkit's fallible setup and serving operations.
///
/// Application-level failures (404, 400, etc.) are expressed as
/// [`ErrorResponse`](crate::ErrorResponse) values, not as `Error`s. This type
/// surfaces infrastructure failures: reading the listener configuration,
/// binding to a port or accepting a connection.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid bind address `{addr}`: {source}")]
    InvalidAddress {
        addr: String,
        #[source]
        source: AddrParseError,
    },

    #[error("SERVICE_PORT is not a valid port: `{value}`")]
    InvalidServicePort {
        value: String,
        #[source]
        source: ParseIntError,
    },
}
