use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use tasklist_types::api::ErrorBody;

use crate::token::TokenError;

pub const MUST_AUTHENTICATE: &str = "must authenticate";
pub const INVALID_CREDENTIALS: &str = "invalid username or password";

/// Every failure the core can report. The transport only sees the kind and a
/// caller-safe message; `Internal` details stay in the server log.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad input: {0}")]
    BadInput(String),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found")]
    NotFound,

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<TokenError> for ApiError {
    fn from(_: TokenError) -> Self {
        ApiError::Unauthorized(MUST_AUTHENTICATE)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::BadInput(msg) => msg.clone(),
            ApiError::Unauthorized(msg) => msg.to_string(),
            ApiError::Forbidden(msg) => msg.to_string(),
            ApiError::Conflict(msg) => msg.clone(),
            ApiError::NotFound => "resource not found".to_string(),
            ApiError::Internal(e) => {
                error!("Internal error: {:#}", e);
                "internal server error".to_string()
            }
        };

        (
            status,
            Json(ErrorBody {
                status: status.as_u16(),
                message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_statuses() {
        assert_eq!(ApiError::BadInput("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Unauthorized(MUST_AUTHENTICATE).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden("no").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::Conflict("dup".into()).status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(anyhow::anyhow!("disk on fire")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn token_errors_collapse_to_fixed_message() {
        let err = ApiError::from(TokenError::ExpiredOrInvalid);
        assert!(matches!(err, ApiError::Unauthorized(MUST_AUTHENTICATE)));
    }
}
