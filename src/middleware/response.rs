use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

/// Successful handler outcome: a `{success, data}` envelope, or an empty 204
#[derive(Debug)]
pub enum ApiResponse<T: Serialize> {
    Data(T),
    NoContent,
}

#[derive(Serialize)]
struct Envelope<T> {
    success: bool,
    data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        ApiResponse::Data(data)
    }
}

impl ApiResponse<()> {
    pub fn no_content() -> Self {
        ApiResponse::NoContent
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        match self {
            ApiResponse::NoContent => StatusCode::NO_CONTENT.into_response(),
            ApiResponse::Data(data) => Json(Envelope {
                success: true,
                data,
            })
            .into_response(),
        }
    }
}
