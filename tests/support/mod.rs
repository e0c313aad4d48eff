//! テスト用のモックOCRサーバー（axum）

#![allow(dead_code)]

use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use std::sync::{Arc, Mutex};

/// サーバーが受け取った multipart フィールド
#[derive(Debug, Clone)]
pub struct SeenField {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl SeenField {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

/// 固定応答を返し、受信内容を記録するサーバー
#[derive(Clone)]
pub struct MockOcr {
    status: StatusCode,
    content_type: &'static str,
    body: String,
    seen: Arc<Mutex<Vec<SeenField>>>,
}

impl MockOcr {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self::new(status, "application/json", body.to_string())
    }

    pub fn plain(status: u16, body: &str) -> Self {
        Self::new(status, "text/plain; charset=utf-8", body.to_string())
    }

    fn new(status: u16, content_type: &'static str, body: String) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap(),
            content_type,
            body,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn seen(&self) -> Vec<SeenField> {
        self.seen.lock().unwrap().clone()
    }

    pub fn field(&self, name: &str) -> Option<SeenField> {
        self.seen().into_iter().find(|f| f.name == name)
    }

    /// 起動してエンドポイントURLを返す
    pub async fn spawn(&self) -> String {
        let app = Router::new()
            .route("/ocr", post(handle))
            .with_state(self.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/ocr", addr)
    }
}

async fn handle(State(mock): State<MockOcr>, mut multipart: Multipart) -> Response {
    while let Some(field) = multipart.next_field().await.unwrap() {
        let seen = SeenField {
            name: field.name().unwrap_or_default().to_string(),
            file_name: field.file_name().map(str::to_string),
            content_type: field.content_type().map(str::to_string),
            data: field.bytes().await.unwrap().to_vec(),
        };
        mock.seen.lock().unwrap().push(seen);
    }
    (
        mock.status,
        [(header::CONTENT_TYPE, mock.content_type)],
        mock.body.clone(),
    )
        .into_response()
}

/// 接続を拒否するエンドポイント（一度bindしてすぐ閉じたポート）
pub async fn refused_endpoint() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/ocr", addr)
}
