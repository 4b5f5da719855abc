use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum_typed_multipart::{FieldMetadata, TypedMultipart, TypedMultipartError};
use log::info;

use super::error::{AppError, Result};
use super::state::AppState;
use super::types::*;
use crate::error::AnalyzeError;
use crate::format::ImageFormat;
use crate::relay::AnalysisItem;

/// 分析一张图片，返回按置信度从高到低排序的标签
#[utoipa::path(
    post,
    path = "/api/analyze",
    request_body(content = AnalyzeForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = [AnalysisItem]),
        (status = 400, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
pub async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    data: std::result::Result<TypedMultipart<AnalyzeRequest>, TypedMultipartError>,
) -> Result<Json<Vec<AnalysisItem>>> {
    let TypedMultipart(data) = data.map_err(AppError::from_rejection)?;
    let image = data.image.ok_or(AnalyzeError::MissingInput)?;

    let mime = image_mime(&image.metadata);
    info!(
        "正在分析上传图片 {:?}，类型 {}，大小 {} 字节",
        image.metadata.file_name.as_deref().unwrap_or_default(),
        mime,
        image.contents.len()
    );

    let items = state.relay.analyze(&image.contents, &mime).await?;
    Ok(Json(items))
}

/// 健康检查
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse { status: "OK".to_string(), model: state.relay.model_name().to_string() })
}

/// 优先使用表单里声明的类型，无法识别时再根据文件名判断
fn image_mime(metadata: &FieldMetadata) -> String {
    let content_type = metadata.content_type.as_deref().unwrap_or_default();
    if ImageFormat::from_mime(content_type).is_some() {
        return content_type.to_string();
    }
    metadata
        .file_name
        .as_deref()
        .and_then(|name| ImageFormat::from_path(name))
        .map_or_else(|| content_type.to_string(), |format| format.mime().to_string())
}
