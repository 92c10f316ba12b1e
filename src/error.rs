//! Chapter Vault Error Types
//!
//! 애플리케이션 전역 에러 타입 정의

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::storage::StorageError;

/// Chapter Vault 에러
#[derive(Error, Debug)]
pub enum PortalError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Chapter version not found: group {group_id}, chapter {chapter_number}, version {version}")]
    VersionNotFound {
        group_id: i64,
        chapter_number: i64,
        version: i64,
    },

    #[error("No versions found: group {group_id}, chapter {chapter_number}")]
    LineageEmpty { group_id: i64, chapter_number: i64 },

    #[error("Version conflict: {0}")]
    Conflict(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PortalError {
    /// 안정적인 머신 코드 (HTTP 응답 / 로그용)
    pub fn code(&self) -> &'static str {
        match self {
            PortalError::Database(_) => "DB_ERROR",
            PortalError::Io(_) => "IO_ERROR",
            PortalError::Serialization(_) => "SERIALIZATION_ERROR",
            PortalError::Storage(StorageError::NotFound(_)) => "BLOB_NOT_FOUND",
            PortalError::Storage(_) => "STORAGE_ERROR",
            PortalError::VersionNotFound { .. } => "VERSION_NOT_FOUND",
            PortalError::LineageEmpty { .. } => "LINEAGE_EMPTY",
            PortalError::Conflict(_) => "VERSION_CONFLICT",
            PortalError::InvalidRequest(_) => "INVALID_REQUEST",
            PortalError::Config(_) => "CONFIG_ERROR",
            PortalError::Lock(_) => "LOCK_ERROR",
            PortalError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, PortalError::Conflict(_))
    }

    fn status(&self) -> StatusCode {
        match self {
            PortalError::VersionNotFound { .. }
            | PortalError::LineageEmpty { .. }
            | PortalError::Storage(StorageError::NotFound(_)) => StatusCode::NOT_FOUND,
            PortalError::Conflict(_) => StatusCode::CONFLICT,
            PortalError::InvalidRequest(_) | PortalError::Storage(StorageError::InvalidKey(_)) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// HTTP 응답용 직렬화 가능한 에러
#[derive(Debug, Serialize)]
pub struct CommandError {
    pub success: bool,
    pub code: String,
    #[serde(rename = "error")]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl From<&PortalError> for CommandError {
    fn from(error: &PortalError) -> Self {
        CommandError {
            success: false,
            code: error.code().to_string(),
            message: error.to_string(),
            details: None,
        }
    }
}

impl From<PortalError> for CommandError {
    fn from(error: PortalError) -> Self {
        CommandError::from(&error)
    }
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), "request failed: {}", self);
        }
        (status, Json(CommandError::from(&self))).into_response()
    }
}

/// 크레이트 공용 결과 타입
pub type PortalResult<T> = Result<T, PortalError>;
