use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum_typed_multipart::TypedMultipartError;

use super::types::ErrorResponse;
use crate::error::AnalyzeError;
use crate::format::ImageFormat;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

/// API错误类型
#[derive(Debug)]
pub enum AppError {
    Analyze(AnalyzeError),
    /// 除了缺少图片以外的表单解析错误，原样返回
    Multipart(TypedMultipartError),
}

impl AppError {
    /// 请求不是 multipart 表单或者缺少字段时，都视为没有上传图片
    pub fn from_rejection(err: TypedMultipartError) -> Self {
        match err {
            TypedMultipartError::InvalidRequest { .. } | TypedMultipartError::MissingField { .. } => {
                Self::Analyze(AnalyzeError::MissingInput)
            }
            other => Self::Multipart(other),
        }
    }
}

impl From<AnalyzeError> for AppError {
    fn from(err: AnalyzeError) -> Self {
        Self::Analyze(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let err = match self {
            Self::Multipart(err) => return err.into_response(),
            Self::Analyze(err) => err,
        };

        let (status, body) = match err {
            AnalyzeError::MissingInput => (
                StatusCode::BAD_REQUEST,
                ErrorResponse { error: "No image file provided.".to_string(), details: None, raw: None },
            ),
            AnalyzeError::UnsupportedImage(_) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: format!("Unsupported image format. Use: {}", ImageFormat::ALLOWED),
                    details: None,
                    raw: None,
                },
            ),
            AnalyzeError::Upstream(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    error: "Failed to analyze image.".to_string(),
                    details: Some(details),
                    raw: None,
                },
            ),
            AnalyzeError::InvalidResponse { raw, .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    error: "Invalid response from Gemini.".to_string(),
                    details: None,
                    raw: Some(raw),
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}
