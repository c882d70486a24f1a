//! Error types shared across the client session

use std::time::Duration;
use thiserror::Error;

/// Boxed error returned by packet listeners.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Invalid operator input in the move flow. Never fatal.
#[derive(Debug, Error, PartialEq)]
pub enum MoveError {
    #[error("invalid axis '{0}', expected one of x, y, z")]
    InvalidAxis(String),
    #[error("invalid distance '{0}', expected a number")]
    InvalidNumber(String),
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// Error document returned by the identity service, shown verbatim.
    #[error("{error}: {message}")]
    Service { error: String, message: String },
    #[error("authentication request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed authentication response: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("not connected")]
    NotConnected,
    #[error("connection closed")]
    Closed,
    #[error("could not resolve host '{0}'")]
    Unresolved(String),
    #[error("network error: {0}")]
    Io(#[from] std::io::Error),
    #[error("packet encoding failed: {0}")]
    Codec(#[from] bincode::Error),
}

#[derive(Debug, Error, PartialEq)]
pub enum AddressError {
    #[error("Invalid server address: '{0}'.")]
    Invalid(String),
}

/// Fatal outcomes of a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error("terminal error: {0}")]
    Io(#[from] std::io::Error),
    #[error("input stream closed")]
    InputClosed,
    #[error("disconnected: {0}")]
    Disconnected(String),
    #[error("no join acknowledgment within {0:?}")]
    JoinTimeout(Duration),
}
