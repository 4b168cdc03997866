use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Serialize;
use thiserror::Error;
use zkdocs::{CompileError, EncodingError, ProtocolError, SchemaError, ZkError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unprocessable: {0}")]
    Unprocessable(String),

    #[error("proof verification timed out")]
    Timeout,

    #[error("internal error")]
    Internal,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match &self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
            ApiError::Unprocessable(m) => (StatusCode::UNPROCESSABLE_ENTITY, m.clone()),
            ApiError::Timeout => (StatusCode::GATEWAY_TIMEOUT, self.to_string()),
            ApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string()),
        };

        (status, Json(ErrorBody { error: msg })).into_response()
    }
}

impl From<SchemaError> for ApiError {
    fn from(e: SchemaError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<EncodingError> for ApiError {
    fn from(e: EncodingError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<CompileError> for ApiError {
    fn from(e: CompileError) -> Self {
        // A validated schema always compiles.
        tracing::error!(error = %e, "schema validated but failed to compile");
        ApiError::Internal
    }
}

impl From<ZkError> for ApiError {
    fn from(e: ZkError) -> Self {
        tracing::error!(error = %e, "proving backend failure");
        ApiError::Internal
    }
}

impl From<ProtocolError> for ApiError {
    fn from(e: ProtocolError) -> Self {
        let msg = e.to_string();
        match e {
            ProtocolError::NotAdmin(_) | ProtocolError::WrongAttester { .. } => ApiError::Forbidden(msg),

            ProtocolError::AlreadyPosted(_)
            | ProtocolError::AlreadyAttested(_)
            | ProtocolError::InstitutionAlreadyValid(_)
            | ProtocolError::NotFullyAttested { .. } => ApiError::Conflict(msg),

            ProtocolError::NotPosted(_)
            | ProtocolError::UnknownFieldIndex(_)
            | ProtocolError::FieldPositionOutOfRange { .. } => ApiError::NotFound(msg),

            ProtocolError::WrongArity { .. }
            | ProtocolError::UnknownInstitution { .. }
            | ProtocolError::FieldCountMismatch { .. }
            | ProtocolError::ConstantsMismatch { .. } => ApiError::BadRequest(msg),

            ProtocolError::Proof(ZkError::Serialization(_)) => ApiError::BadRequest(msg),
            ProtocolError::Proof(_) => ApiError::Unprocessable(msg),
        }
    }
}
