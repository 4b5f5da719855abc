use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::GeminiOptions;
use crate::vision::{InlineImage, VisionModel};

/// Google Gemini generateContent 接口的客户端
///
/// 启动时创建一次，之后在所有请求之间共享，内部不保存任何可变状态。
pub struct GeminiClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(opts: &GeminiOptions) -> Result<Self> {
        let client = reqwest::Client::builder().connect_timeout(Duration::from_secs(10)).build()?;
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            opts.endpoint.trim_end_matches('/'),
            opts.model
        );
        Ok(Self { client, url, api_key: opts.api_key.clone(), model: opts.model.clone() })
    }
}

#[async_trait]
impl VisionModel for GeminiClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, image: &InlineImage, prompt: &str) -> Result<String> {
        let body = GenerateRequest {
            contents: [Content {
                parts: vec![
                    Part::InlineData(Blob { mime_type: image.mime_type, data: &image.data }),
                    Part::Text(prompt),
                ],
            }],
        };

        debug!("请求 {}", self.url);
        // key 放在请求头里，reqwest 的错误信息会带上 URL
        let resp = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.without_url())?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ErrorResponse>(&text) {
                Ok(err) => err.error.message,
                Err(_) if text.trim().is_empty() => status.to_string(),
                Err(_) => text,
            };
            bail!("Gemini API error ({status}): {message}");
        }

        let resp: GenerateResponse = resp.json().await.map_err(|e| e.without_url())?;
        reply_text(resp)
    }
}

/// 取出第一个候选回复中的全部文本
fn reply_text(resp: GenerateResponse) -> Result<String> {
    let Some(candidate) = resp.candidates.into_iter().next() else {
        return match resp.prompt_feedback.and_then(|f| f.block_reason) {
            Some(reason) => Err(anyhow!("prompt was blocked: {reason}")),
            None => Err(anyhow!("model returned no candidates")),
        };
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        if let Some(reason) = candidate.finish_reason.filter(|r| r != "STOP") {
            bail!("model returned no text (finish reason: {reason})");
        }
    }
    Ok(text)
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum Part<'a> {
    InlineData(Blob<'a>),
    Text(&'a str),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Blob<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}
