//! HTTP error mapping.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::cache::CacheError;
use crate::gateway::GatewayError;
use crate::warmup::WarmUpError;

#[derive(Debug)]
pub enum AppError {
    /// La entidad no existe en la base
    NotFound(String),

    /// Parametros invalidos
    BadRequest(String),

    /// Ni la base, ni stale, ni fallback
    Unavailable(String),

    /// Operacion en curso
    Conflict(String),

    /// Error interno
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not Found", msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "Bad Request", msg),
            AppError::Unavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service Unavailable",
                msg,
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "Conflict", msg),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
                msg,
            ),
        };

        let body = Json(ErrorResponse {
            error: error.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::NotFound { .. } => AppError::NotFound(err.to_string()),
            GatewayError::Unavailable { .. } => AppError::Unavailable(err.to_string()),
            GatewayError::Decode { .. } => AppError::Internal(err.to_string()),
        }
    }
}

impl From<CacheError> for AppError {
    fn from(err: CacheError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<WarmUpError> for AppError {
    fn from(err: WarmUpError) -> Self {
        AppError::Conflict(err.to_string())
    }
}
