//! # Design
//!
//! - Constant-message errors for hosting the HTTP surface.
//! - Handler failures map to bare status codes; details are logged, never returned.

use std::io;
use std::net::SocketAddr;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors produced while hosting the HTTP surface.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not bind its address.
    #[error("server bind failure")]
    Bind {
        /// Address the listener attempted to bind.
        addr: SocketAddr,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The server loop terminated with an IO failure.
    #[error("server terminated unexpectedly")]
    Serve {
        /// Underlying IO error.
        source: io::Error,
    },
}

/// Handler failure rendered as a plain status response.
#[derive(Debug)]
pub(crate) struct HttpError {
    status: StatusCode,
    message: &'static str,
}

impl HttpError {
    pub(crate) const fn internal(message: &'static str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn server_errors_keep_sources() {
        let bind = ServerError::Bind {
            addr: SocketAddr::from(([127, 0, 0, 1], 8085)),
            source: io::Error::new(io::ErrorKind::AddrInUse, "in use"),
        };
        assert_eq!(bind.to_string(), "server bind failure");
        assert!(bind.source().is_some());

        let serve = ServerError::Serve {
            source: io::Error::other("reset"),
        };
        assert_eq!(serve.to_string(), "server terminated unexpectedly");
    }

    #[test]
    fn http_error_maps_to_status() {
        let response = HttpError::internal("failed to render metrics").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
