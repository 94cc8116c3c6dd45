use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt;

/// Closed set of failures crossing the service boundary. The API layer maps
/// each variant to a `{message, code}` JSON body and the matching HTTP status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Missing or malformed caller input.
    Validation(String),
    /// No caller identity at all.
    Unauthenticated,
    /// Identity present, but not the resource owner.
    Unauthorized(String),
    NotFound(String),
    /// AI / geocode / image / mail upstream exhausted or broken.
    Upstream(String),
}

impl ServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "BAD_REQUEST",
            ServiceError::Unauthenticated | ServiceError::Unauthorized(_) => "UNAUTHORIZED",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::Upstream(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ServiceError::Validation(msg)
            | ServiceError::Unauthorized(msg)
            | ServiceError::NotFound(msg)
            | ServiceError::Upstream(msg) => msg,
            ServiceError::Unauthenticated => "You must be logged in",
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl std::error::Error for ServiceError {}

impl From<mongodb::error::Error> for ServiceError {
    fn from(err: mongodb::error::Error) -> Self {
        ServiceError::Upstream(format!("Database error: {}", err))
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
    code: &'static str,
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Unauthenticated | ServiceError::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED
            }
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            message: self.message(),
            code: self.code(),
        })
    }
}
