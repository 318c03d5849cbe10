use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use engine::{CommandExecResult, ErrorCode};
use ledger::LedgerError;
use serde_json::json;
use thiserror::Error;

/// Central error type for the gateway.
///
/// The HTTP mapping is part of the external contract:
/// `INVALID_ARGUMENT → 400`, `ORDER_NOT_FOUND → 404`,
/// `ORDER_ALREADY_FILLED → 400`, `ORDER_ALREADY_CANCELED → 400`,
/// `UNAUTHORIZED → 403`, `DUPLICATE_REQUEST → 409`,
/// `INSUFFICIENT_BALANCE → 400`, anything else `500`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    InsufficientBalance(String),

    #[error("{0}")]
    OrderNotFound(String),

    #[error("{0}")]
    OrderAlreadyFilled(String),

    #[error("{0}")]
    OrderAlreadyCanceled(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    DuplicateRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Map a failed engine result onto the API taxonomy.
    pub fn from_exec(result: &CommandExecResult) -> Self {
        let message = result
            .error
            .clone()
            .unwrap_or_else(|| "command failed".to_string());
        match result.error_code {
            ErrorCode::InvalidArgument | ErrorCode::None => ApiError::InvalidArgument(message),
            ErrorCode::OrderNotFound => ApiError::OrderNotFound(message),
            ErrorCode::OrderAlreadyFilled => ApiError::OrderAlreadyFilled(message),
            ErrorCode::OrderAlreadyCanceled => ApiError::OrderAlreadyCanceled(message),
            ErrorCode::Unauthorized => ApiError::Unauthorized(message),
            ErrorCode::DuplicateRequest => ApiError::DuplicateRequest(message),
            ErrorCode::InternalError => ApiError::Internal(message),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match &err {
            LedgerError::InsufficientBalance { .. } => {
                ApiError::InsufficientBalance(err.to_string())
            }
            LedgerError::Symbol(_)
            | LedgerError::InvalidAmount
            | LedgerError::MissingField(_) => ApiError::InvalidArgument(err.to_string()),
            LedgerError::FreezeAccountMismatch { .. } => ApiError::Unauthorized(err.to_string()),
            LedgerError::FreezeConflict(_)
            | LedgerError::AccountNotFound(_)
            | LedgerError::FrozenUnderflow { .. }
            | LedgerError::FreezeRecordUnderflow(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::InvalidArgument(_) => (StatusCode::BAD_REQUEST, "INVALID_ARGUMENT"),
            ApiError::InsufficientBalance(_) => (StatusCode::BAD_REQUEST, "INSUFFICIENT_BALANCE"),
            ApiError::OrderNotFound(_) => (StatusCode::NOT_FOUND, "ORDER_NOT_FOUND"),
            ApiError::OrderAlreadyFilled(_) => (StatusCode::BAD_REQUEST, "ORDER_ALREADY_FILLED"),
            ApiError::OrderAlreadyCanceled(_) => {
                (StatusCode::BAD_REQUEST, "ORDER_ALREADY_CANCELED")
            }
            ApiError::Unauthorized(_) => (StatusCode::FORBIDDEN, "UNAUTHORIZED"),
            ApiError::DuplicateRequest(_) => (StatusCode::CONFLICT, "DUPLICATE_REQUEST"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };
        let body = Json(json!({
            "code": code,
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}
