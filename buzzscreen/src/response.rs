use std::collections::HashMap;

use axum::{http::StatusCode, response::IntoResponse, Json};

#[derive(Debug, PartialEq, Eq)]
pub enum ResponseError {
    NotFound,
    BadRequest(String),
    Unauthorized,
    Forbidden(String),
    Conflict(String),
    Unprocessable(String),
    Internal(String),
}

impl ResponseError {
    fn status(&self) -> StatusCode {
        match self {
            ResponseError::NotFound => StatusCode::NOT_FOUND,
            ResponseError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ResponseError::Unauthorized => StatusCode::UNAUTHORIZED,
            ResponseError::Forbidden(_) => StatusCode::FORBIDDEN,
            ResponseError::Conflict(_) => StatusCode::CONFLICT,
            ResponseError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ResponseError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ResponseError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();

        let message = match self {
            ResponseError::NotFound => "Not found".to_string(),
            ResponseError::Unauthorized => "invalid authorization".to_string(),
            ResponseError::BadRequest(message)
            | ResponseError::Forbidden(message)
            | ResponseError::Conflict(message)
            | ResponseError::Unprocessable(message)
            | ResponseError::Internal(message) => message,
        };

        let error_response = [("message", message)]
            .into_iter()
            .collect::<HashMap<_, _>>();

        (status, Json(error_response)).into_response()
    }
}

impl<T> From<T> for ResponseError
where
    T: std::error::Error + 'static,
{
    fn from(error: T) -> Self {
        ResponseError::BadRequest(error.to_string())
    }
}
