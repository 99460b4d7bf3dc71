use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

/// Error taxonomy for the feed core.
///
/// `MailboxUnavailable` and `DependencyUnavailable` never reach an HTTP
/// response - callers catch them at the stage boundary and apply the
/// documented fallback (empty list / local cache / heuristic score). They
/// exist as distinct variants purely so the call site can match on them
/// without string-sniffing `Internal`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Mailbox unavailable: {0}")]
    MailboxUnavailable(String),

    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let code = self.status_code();
        HttpResponse::build(code).json(ErrorResponse {
            error: self.to_string(),
            code: code.as_u16(),
        })
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            // These never escape the orchestrator in practice, but give them
            // a sane mapping rather than panicking if one ever does.
            AppError::MailboxUnavailable(_) | AppError::DependencyUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("resource not found".to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::MailboxUnavailable(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::DependencyUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        assert_eq!(
            AppError::NotFound("viewer".into()).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn dependency_unavailable_never_5xx_client_facing_but_maps_safely() {
        assert_eq!(
            AppError::DependencyUnavailable("feature store".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
