// src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Upstream request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Report generation failed: {0}")]
    Report(String),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),

    #[error("Internal server error")]
    Internal,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Http(_) => StatusCode::BAD_GATEWAY,
            AppError::Upstream { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::Report(_) | AppError::Spreadsheet(_) | AppError::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AppError::NotFound(_) | AppError::Upstream { status: 404, .. }
        )
    }
}

// 核心逻辑：将我们的错误转换为 HTTP 响应
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match self {
            AppError::Http(ref e) => {
                // 后台记录详细错误，对外只给出概要
                tracing::error!("上游请求失败: {:?}", e);
                "Records service is unavailable".to_string()
            }
            AppError::Upstream { status, message } => {
                tracing::warn!(status, "上游返回错误: {}", message);
                message
            }
            AppError::Report(ref e) => {
                tracing::error!("报表生成失败: {}", e);
                "Report generation failed".to_string()
            }
            AppError::Spreadsheet(ref e) => {
                tracing::error!("Excel 生成失败: {:?}", e);
                "Report generation failed".to_string()
            }
            AppError::Internal => "Internal server error".to_string(),
            AppError::Auth(msg)
            | AppError::NotFound(msg)
            | AppError::Forbidden(msg)
            | AppError::BadRequest(msg) => msg,
            AppError::ValidationError(ref e) => format!("Invalid input: {}", e),
        };

        let body = Json(json!({
            "status": "error",
            "message": error_message,
        }));

        (status, body).into_response()
    }
}
