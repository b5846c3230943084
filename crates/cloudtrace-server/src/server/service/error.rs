use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use cloudtrace_core::ErrorResponse;
use core::any::Any;

/// Errors the HTTP layer reports through its status code.
///
/// Persistence failures on the log-write path are deliberately absent: they
/// are reported inside a 200 body.
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

/// Turns a handler panic into a JSON 500 instead of a dropped connection.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        *s
    } else {
        "unknown panic payload"
    };

    tracing::error!(panic = detail, "Request handler panicked");
    AppError::Internal.into_response()
}
