use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::{debug, error, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{AnalyzeError, Result};
use crate::format::ImageFormat;
use crate::metrics;
use crate::vision::{InlineImage, VisionModel};

/// 发送给模型的固定提示词
pub const PROMPT: &str = "Analyze this image and identify the main objects, concepts, and entities present. \
For each item you identify, provide a descriptive label and an estimated confidence score from 0 to 1. \
Return ONLY the result as a JSON array of objects, where each object has 'label' and 'confidence' keys. \
Do not include any explanation or text, just the JSON array.";

static FENCE_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^```(?:json)?\s*").unwrap());
static FENCE_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*```$").unwrap());

/// 识别出的一个物体或概念
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AnalysisItem {
    /// 物体、概念或实体的名称
    pub label: String,
    /// 模型给出的置信度，通常在 0 到 1 之间
    pub confidence: f64,
}

/// 把图片转发给视觉模型，并把回复整理为按置信度排序的结果
#[derive(Clone)]
pub struct Relay {
    model: Arc<dyn VisionModel>,
    timeout: Duration,
}

impl Relay {
    pub fn new(model: Arc<dyn VisionModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// 分析一张图片
    ///
    /// 模型调用失败或回复无法解析时直接返回错误，不做任何重试。
    pub async fn analyze(&self, image: &[u8], mime_type: &str) -> Result<Vec<AnalysisItem>> {
        let start = Instant::now();
        let result = self.analyze_inner(image, mime_type).await;
        let elapsed = start.elapsed().as_secs_f64();

        metrics::observe_analysis(&result, elapsed);
        match &result {
            Ok(items) => info!("分析完成，识别出 {} 个标签，耗时 {:.2}s", items.len(), elapsed),
            Err(AnalyzeError::InvalidResponse { raw, source }) => {
                error!("无法解析模型回复: {source}\n{raw}")
            }
            Err(e @ (AnalyzeError::MissingInput | AnalyzeError::UnsupportedImage(_))) => {
                warn!("拒绝分析请求: {e}")
            }
            Err(e) => error!("分析失败: {e}"),
        }
        result
    }

    async fn analyze_inner(&self, image: &[u8], mime_type: &str) -> Result<Vec<AnalysisItem>> {
        if image.is_empty() {
            return Err(AnalyzeError::MissingInput);
        }
        let format = ImageFormat::from_mime(mime_type)
            .ok_or_else(|| AnalyzeError::UnsupportedImage(mime_type.to_string()))?;

        let image = InlineImage { mime_type: format.mime(), data: STANDARD.encode(image) };
        debug!("调用模型 {}，图片 {} 字节", self.model.name(), image.data.len());

        let reply = tokio::time::timeout(self.timeout, self.model.generate(&image, PROMPT))
            .await
            .map_err(|_| {
                AnalyzeError::Upstream(format!(
                    "model call timed out after {}s",
                    self.timeout.as_secs_f32()
                ))
            })?
            .map_err(|e| AnalyzeError::Upstream(e.to_string()))?;

        parse_reply(&reply)
    }
}

/// 去掉模型可能包裹在 JSON 外面的 Markdown 代码块标记
pub fn strip_fences(text: &str) -> &str {
    let text = text.trim();
    let start = FENCE_OPEN.find(text).map_or(0, |m| m.end());
    let text = &text[start..];
    let end = FENCE_CLOSE.find(text).map_or(text.len(), |m| m.start());
    &text[..end]
}

/// 解析模型回复并按置信度从高到低排序
pub fn parse_reply(raw: &str) -> Result<Vec<AnalysisItem>> {
    let mut items: Vec<AnalysisItem> = serde_json::from_str(strip_fences(raw))
        .map_err(|source| AnalyzeError::InvalidResponse { raw: raw.to_string(), source })?;
    rank(&mut items);
    Ok(items)
}

/// 稳定排序，置信度相同的保持模型给出的顺序
pub fn rank(items: &mut [AnalysisItem]) {
    items.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
}
