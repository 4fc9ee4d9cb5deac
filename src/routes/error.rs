use std::backtrace::Backtrace;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use log::error;

/// An error nothing closer to it knew how to handle.
///
/// The client gets a bare 500; the log gets the error and where it came from.
#[derive(Debug)]
pub struct AppError {
    error: Box<dyn std::error::Error + Send + Sync>,
    backtrace: Backtrace,
}

impl<E> From<E> for AppError
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    fn from(error: E) -> Self {
        AppError {
            error: error.into(),
            backtrace: Backtrace::force_capture(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("{}\n{}", self.error, self.backtrace);
        client_error(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// A plain-text response with the status' standard reason as the body.
pub fn client_error(status: StatusCode) -> Response {
    let reason = status.canonical_reason().unwrap_or("Error");
    (status, reason).into_response()
}
