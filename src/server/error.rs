//! Error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::CalorError;

/// A [`CalorError`] rendered as `{"success": false, "error": "..."}`.
#[derive(Debug)]
pub struct ApiError(pub CalorError);

impl From<CalorError> for ApiError {
    fn from(error: CalorError) -> Self {
        Self(error)
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            CalorError::Config(_) | CalorError::Encoding(_) | CalorError::Json(_) => {
                StatusCode::BAD_REQUEST
            }
            CalorError::UnknownJob(_) => StatusCode::NOT_FOUND,
            CalorError::InsufficientPaper { .. } | CalorError::PaperOut => StatusCode::CONFLICT,
            CalorError::QueueFull(_)
            | CalorError::Cooling { .. }
            | CalorError::NotReady(_)
            | CalorError::Halted
            | CalorError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            CalorError::Channel(_) | CalorError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({ "success": false, "error": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}
