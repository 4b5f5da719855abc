use async_trait::async_trait;

/// 随请求一起发送给模型的图片
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub mime_type: &'static str,
    /// base64 编码后的图片内容
    pub data: String,
}

/// 多模态视觉模型
///
/// 实现者只负责把图片和提示词发出去并取回文本，回复的解析由 [`crate::Relay`] 完成。
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// 模型名称
    fn name(&self) -> &str;

    /// 发送一次多模态请求，返回模型的原始文本回复
    async fn generate(&self, image: &InlineImage, prompt: &str) -> anyhow::Result<String>;
}
