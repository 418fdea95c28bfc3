use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::json;

/// Wrapper for JSON responses that adds the `{success, data}` envelope
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub status_code: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful API response with 200 status
    pub fn success(data: T) -> Self {
        Self {
            data,
            status_code: StatusCode::OK,
        }
    }

    /// Create a 201 Created response
    pub fn created(data: T) -> Self {
        Self {
            data,
            status_code: StatusCode::CREATED,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let data_value = match serde_json::to_value(&self.data) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Failed to serialize response data: {}", e);
                return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
            }
        };

        let envelope = json!({
            "success": true,
            "data": data_value
        });

        (self.status_code, Json(envelope)).into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, crate::error::ApiError>;
