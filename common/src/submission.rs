//! OCRエンドポイントへの送信とレスポンス解釈
//!
//! 通信自体は `OcrTransport` 実装（ブラウザ: fetch / ネイティブ: reqwest）が担い、
//! ここではリクエストの組み立てとレスポンスの解釈だけを行う。

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{ScanError, GENERIC_SERVER_ERROR};
use crate::types::{NormalizedImage, ProcessingMode};

/// multipart の画像フィールド名
pub const IMAGE_FIELD: &str = "image";

/// multipart のモードフィールド名
pub const FILTER_FIELD: &str = "filter";

/// 送信内容
#[derive(Debug, Clone, PartialEq)]
pub struct OcrRequest {
    pub image: NormalizedImage,
    pub file_name: String,
    pub mode: ProcessingMode,
}

impl OcrRequest {
    pub fn new(image: NormalizedImage, file_name: impl Into<String>, mode: ProcessingMode) -> Self {
        Self {
            image,
            file_name: file_name.into(),
            mode,
        }
    }

    /// filter フィールドの値（"true" / "false"）
    pub fn filter_value(&self) -> &'static str {
        self.mode.as_form_value()
    }
}

/// 受信したHTTPレスポンス（本文は全量読み込み済み）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn declares_json(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"))
    }
}

/// 送信結果
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionResult {
    Text(String),
    Error(ScanError),
}

impl SubmissionResult {
    pub fn is_text(&self) -> bool {
        matches!(self, SubmissionResult::Text(_))
    }
}

/// HTTP送信の抽象
///
/// 1回のPOSTで全量を受け取る。リトライはしない。
/// リクエストが完了しなかった場合のみ Err（ScanError::Network）を返す。
#[allow(async_fn_in_trait)]
pub trait OcrTransport {
    async fn post(&self, request: &OcrRequest) -> Result<RawResponse, ScanError>;
}

/// JSON本文
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OcrPayload {
    text: Option<serde_json::Value>,
    error: Option<serde_json::Value>,
}

enum Body {
    Json(OcrPayload),
    Plain(String),
}

fn parse_body(response: &RawResponse) -> Body {
    if response.declares_json() {
        match serde_json::from_str::<OcrPayload>(&response.body) {
            Ok(payload) => return Body::Json(payload),
            // JSON宣言でもパースできなければテキストとして扱う
            Err(e) => warn!("response declared JSON but failed to parse: {}", e),
        }
    }
    Body::Plain(response.body.clone())
}

/// レスポンスを解釈する
pub fn interpret_response(response: &RawResponse) -> SubmissionResult {
    let body = parse_body(response);

    if !response.is_success() {
        let message = match body {
            Body::Json(OcrPayload {
                error: Some(serde_json::Value::String(message)),
                ..
            }) if !message.is_empty() => message,
            _ => GENERIC_SERVER_ERROR.to_string(),
        };
        warn!(status = response.status, "server rejected image: {}", message);
        return SubmissionResult::Error(ScanError::Server(message));
    }

    match body {
        Body::Json(OcrPayload {
            text: Some(serde_json::Value::String(text)),
            ..
        }) => SubmissionResult::Text(text.trim().to_string()),
        Body::Json(_) => {
            warn!("JSON response without a text field");
            SubmissionResult::Error(ScanError::generic_server())
        }
        Body::Plain(text) => SubmissionResult::Text(text.trim().to_string()),
    }
}

/// 正規化済み画像を送信し、結果を返す
pub async fn submit<T: OcrTransport>(transport: &T, request: &OcrRequest) -> SubmissionResult {
    info!(
        file = %request.file_name,
        filter = request.mode.filter_enabled,
        size = request.image.bytes.len(),
        "submitting image"
    );

    match transport.post(request).await {
        Ok(response) => interpret_response(&response),
        Err(ScanError::Network(detail)) => {
            warn!("request did not complete: {}", detail);
            SubmissionResult::Error(ScanError::Network(detail))
        }
        Err(other) => SubmissionResult::Error(other),
    }
}
