use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use imanalyze::server::{AppState, create_app};
use imanalyze::{InlineImage, Relay, VisionModel};
use rstest::*;
use serde_json::{Value, json};
use tower::ServiceExt;

const BOUNDARY: &str = "imanalyze-test-boundary";
const IMAGE: &[u8] = b"fake-image-data";
const CAT_AND_ANIMAL: &str =
    r#"[{"label": "cat", "confidence": 0.9}, {"label": "animal", "confidence": 0.95}]"#;

/// 模拟视觉模型，记录调用次数和收到的图片
struct FakeModel {
    reply: Result<String, String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    seen: Mutex<Option<InlineImage>>,
}

impl FakeModel {
    fn replying(text: &str) -> Arc<Self> {
        Self::new(Ok(text.to_string()), None)
    }

    fn failing(message: &str) -> Arc<Self> {
        Self::new(Err(message.to_string()), None)
    }

    fn new(reply: Result<String, String>, delay: Option<Duration>) -> Arc<Self> {
        Arc::new(Self { reply, delay, calls: AtomicUsize::new(0), seen: Mutex::new(None) })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionModel for FakeModel {
    fn name(&self) -> &str {
        "fake-vision"
    }

    async fn generate(&self, image: &InlineImage, prompt: &str) -> anyhow::Result<String> {
        assert!(prompt.contains("JSON array"));
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.seen.lock().unwrap() = Some(image.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone().map_err(|e| anyhow!(e))
    }
}

fn app_with_limit(model: Arc<FakeModel>, upload_limit: usize) -> Router {
    let relay = Relay::new(model, Duration::from_secs(5));
    create_app(AppState::new(relay, upload_limit))
}

fn app(model: Arc<FakeModel>) -> Router {
    app_with_limit(model, 16 * 1024 * 1024)
}

/// 构造 multipart 表单，每个字段为 (字段名, 文件名, 类型, 内容)
fn multipart(fields: &[(&str, &str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, file_name, content_type, data) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn analyze_request(body: Vec<u8>) -> Request<Body> {
    Request::post("/api/analyze")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap()
}

fn image_request() -> Request<Body> {
    analyze_request(multipart(&[("image", "test-image.jpg", "image/jpeg", IMAGE)]))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(request).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[fixture]
fn cat_model() -> Arc<FakeModel> {
    FakeModel::replying(CAT_AND_ANIMAL)
}

#[rstest]
#[case::plain(CAT_AND_ANIMAL.to_string())]
#[case::fenced(format!("```json\n{CAT_AND_ANIMAL}\n```"))]
#[tokio::test]
async fn returns_sorted_labels(#[case] reply: String) {
    let model = FakeModel::replying(&reply);
    let (status, body) = send(app(model.clone()), image_request()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([
            { "label": "animal", "confidence": 0.95 },
            { "label": "cat", "confidence": 0.9 },
        ])
    );
    assert_eq!(model.calls(), 1);
}

#[rstest]
#[tokio::test]
async fn image_is_sent_base64_encoded(cat_model: Arc<FakeModel>) {
    let (status, _) = send(app(cat_model.clone()), image_request()).await;
    assert_eq!(status, StatusCode::OK);

    let seen = cat_model.seen.lock().unwrap().clone().unwrap();
    assert_eq!(seen.mime_type, "image/jpeg");
    assert_eq!(seen.data, STANDARD.encode(IMAGE));
}

#[rstest]
#[tokio::test]
async fn empty_array_is_success() {
    let (status, body) = send(app(FakeModel::replying("[]")), image_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[rstest]
#[tokio::test]
async fn missing_body(cat_model: Arc<FakeModel>) {
    let request = Request::post("/api/analyze").body(Body::empty()).unwrap();
    let (status, body) = send(app(cat_model.clone()), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "No image file provided." }));
    assert_eq!(cat_model.calls(), 0);
}

#[rstest]
#[case::other_field(multipart(&[("photo", "test-image.jpg", "image/jpeg", IMAGE)]))]
#[case::empty_file(multipart(&[("image", "test-image.jpg", "image/jpeg", b"".as_slice())]))]
#[case::no_fields(multipart(&[]))]
#[tokio::test]
async fn missing_image(cat_model: Arc<FakeModel>, #[case] body: Vec<u8>) {
    let (status, body) = send(app(cat_model.clone()), analyze_request(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No image file provided.");
    assert_eq!(cat_model.calls(), 0);
}

#[rstest]
#[tokio::test]
async fn unsupported_format(cat_model: Arc<FakeModel>) {
    let body = multipart(&[("image", "notes.txt", "text/plain", b"hello".as_slice())]);
    let (status, body) = send(app(cat_model.clone()), analyze_request(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unsupported image format. Use: PNG, JPG, JPEG, GIF, BMP, WEBP");
    assert_eq!(cat_model.calls(), 0);
}

#[rstest]
#[tokio::test]
async fn format_from_file_name(cat_model: Arc<FakeModel>) {
    let body = multipart(&[("image", "photo.PNG", "application/octet-stream", IMAGE)]);
    let (status, _) = send(app(cat_model.clone()), analyze_request(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(cat_model.seen.lock().unwrap().as_ref().unwrap().mime_type, "image/png");
}

#[rstest]
#[tokio::test]
async fn upstream_failure() {
    let model = FakeModel::failing("Gemini API Error");
    let (status, body) = send(app(model.clone()), image_request()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to analyze image.");
    assert!(body["details"].as_str().unwrap().contains("Gemini API Error"));
    assert!(body.get("raw").is_none());
    // 不会自动重试
    assert_eq!(model.calls(), 1);
}

#[rstest]
#[case::prose("This is not a valid JSON.")]
#[case::wrong_shape(r#"{"labels": ["cat"]}"#)]
#[tokio::test]
async fn invalid_reply(#[case] reply: &str) {
    let model = FakeModel::replying(reply);
    let (status, body) = send(app(model.clone()), image_request()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Invalid response from Gemini.", "raw": reply }));
    assert_eq!(model.calls(), 1);
}

#[tokio::test]
async fn slow_model_times_out() {
    let model = FakeModel::new(Ok("[]".to_string()), Some(Duration::from_secs(30)));
    let relay = Relay::new(model, Duration::from_millis(50));
    let app = create_app(AppState::new(relay, 1024 * 1024));

    let (status, body) = send(app, image_request()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to analyze image.");
    assert!(body["details"].as_str().unwrap().contains("timed out"));
}

#[rstest]
#[tokio::test]
async fn upload_too_large(cat_model: Arc<FakeModel>) {
    let big = vec![0u8; 4096];
    let body = multipart(&[("image", "big.jpg", "image/jpeg", big.as_slice())]);
    let resp = app_with_limit(cat_model.clone(), 1024).oneshot(analyze_request(body)).await.unwrap();

    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(cat_model.calls(), 0);
}

#[rstest]
#[tokio::test]
async fn health(cat_model: Arc<FakeModel>) {
    let request = Request::get("/health").body(Body::empty()).unwrap();
    let (status, body) = send(app(cat_model), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "OK", "model": "fake-vision" }));
}

#[rstest]
#[tokio::test]
async fn openapi_lists_routes(cat_model: Arc<FakeModel>) {
    let request = Request::get("/api-docs/openapi.json").body(Body::empty()).unwrap();
    let (status, body) = send(app(cat_model), request).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"].get("/api/analyze").is_some());
    assert!(body["paths"].get("/health").is_some());
}
