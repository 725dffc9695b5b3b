use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::views::{self, Page};

/// Failures a handler cannot recover from locally. The client only ever sees a
/// generic 500 page; the detail goes to the log.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!(error = %self, "request failed");
        Page::new("Error", views::internal_error())
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response()
    }
}
