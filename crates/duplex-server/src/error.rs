use thiserror::Error;

use crate::registry::RegistrationError;

/// Errors that end a server's start
#[derive(Error, Debug)]
pub enum StartError {
    #[error("server has already been started")]
    AlreadyStarted,

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid loopback endpoint '{endpoint}': {source}")]
    Endpoint {
        endpoint: String,
        #[source]
        source: tonic::transport::Error,
    },

    #[error("gRPC transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("HTTP server error: {0}")]
    Serve(#[source] std::io::Error),
}

impl StartError {
    pub(crate) fn bind(address: impl Into<String>, source: std::io::Error) -> Self {
        StartError::Bind {
            address: address.into(),
            source,
        }
    }
}
