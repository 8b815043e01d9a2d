use crate::engine::QueryInputError;
use crate::pipeline::SubmitError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// API error with HTTP status code
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub code: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            code: "BAD_REQUEST".to_string(),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            code: "INTERNAL_SERVER_ERROR".to_string(),
        }
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: message.into(),
            code: "SERVICE_UNAVAILABLE".to_string(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "message": self.message,
                "code": self.code,
            }
        }));

        (self.status, body).into_response()
    }
}

/// Convert anyhow::Error to ApiError
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if err.downcast_ref::<QueryInputError>().is_some() {
            return ApiError::bad_request(err.to_string());
        }
        if let Some(e) = err.downcast_ref::<SubmitError>() {
            let constructor = submit_error_constructor(e);
            return constructor(err.to_string());
        }
        // Default to internal server error for unknown errors
        ApiError::internal_error(err.to_string())
    }
}

fn submit_error_constructor(e: &SubmitError) -> fn(String) -> ApiError {
    match e {
        SubmitError::InvalidCounterId(_) | SubmitError::InvalidAmount(_) => {
            ApiError::bad_request
        }
        SubmitError::QueueClosed => ApiError::service_unavailable,
    }
}

/// Convert SubmitError to ApiError
impl From<SubmitError> for ApiError {
    fn from(e: SubmitError) -> Self {
        let constructor = submit_error_constructor(&e);
        constructor(e.to_string())
    }
}

impl From<QueryInputError> for ApiError {
    fn from(e: QueryInputError) -> Self {
        ApiError::bad_request(e.to_string())
    }
}
