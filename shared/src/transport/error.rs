use thiserror::Error;

use crate::JsdtError;

/// Frame could not be sent because the connection is closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Cannot send frame: the connection is closed")]
pub struct SendError;

/// No further frames will arrive because the connection is closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Cannot receive frame: the connection is closed")]
pub struct RecvError;

/// Errors that can occur while listening on or connecting to an endpoint
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Something is already listening on the endpoint
    #[error("Endpoint {endpoint} is already in use")]
    AddressInUse { endpoint: String },

    /// Nothing is listening on the endpoint
    #[error("Nothing is listening on {endpoint}")]
    NotListening { endpoint: String },

    /// The listener was shut down
    #[error("Listener on {endpoint} is closed")]
    Closed { endpoint: String },
}

impl From<SendError> for JsdtError {
    fn from(error: SendError) -> Self {
        JsdtError::connection(error.to_string())
    }
}

impl From<RecvError> for JsdtError {
    fn from(error: RecvError) -> Self {
        JsdtError::connection(error.to_string())
    }
}

impl From<TransportError> for JsdtError {
    fn from(error: TransportError) -> Self {
        JsdtError::connection(error.to_string())
    }
}
