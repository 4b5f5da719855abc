use axum::body::Bytes;
use axum_typed_multipart::{FieldData, TryFromMultipart};
use serde::Serialize;
use utoipa::ToSchema;

/// 分析请求参数
#[derive(TryFromMultipart)]
pub struct AnalyzeRequest {
    // 上传大小由 RequestBodyLimitLayer 统一限制
    #[form_data(limit = "unlimited")]
    pub image: Option<FieldData<Bytes>>,
}

/// 分析表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct AnalyzeForm {
    /// 上传的图片文件，支持 PNG、JPEG、GIF、BMP、WEBP
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub image: String,
}

/// 错误响应
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// 错误描述
    pub error: String,
    /// 模型调用失败时的详细信息
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// 模型回复无法解析时的原始文本
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

/// 健康检查响应
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    /// 当前使用的模型
    pub model: String,
}
