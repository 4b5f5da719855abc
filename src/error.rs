use thiserror::Error;

/// 一次分析请求可能出现的错误
#[derive(Debug, Error)]
pub enum AnalyzeError {
    /// 没有上传图片，或者图片内容为空
    #[error("No image file provided.")]
    MissingInput,
    /// 图片格式不在支持列表中
    #[error("unsupported image format: {0}")]
    UnsupportedImage(String),
    /// 调用模型失败，包括网络错误、鉴权失败、超时等
    #[error("model call failed: {0}")]
    Upstream(String),
    /// 模型返回的文本无法解析为结果数组
    #[error("model returned an unparseable reply: {source}")]
    InvalidResponse {
        /// 模型返回的原始文本
        raw: String,
        source: serde_json::Error,
    },
}

pub type Result<T, E = AnalyzeError> = std::result::Result<T, E>;
