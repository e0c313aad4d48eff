//! reqwest による OCR 送信

use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use scanner_common::submission::{FILTER_FIELD, IMAGE_FIELD};
use scanner_common::{OcrRequest, OcrTransport, RawResponse, ScanError};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl ReqwestTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn network(err: reqwest::Error) -> ScanError {
    ScanError::Network(err.to_string())
}

impl OcrTransport for ReqwestTransport {
    async fn post(&self, request: &OcrRequest) -> Result<RawResponse, ScanError> {
        let part = Part::bytes(request.image.bytes.clone())
            .file_name(request.file_name.clone())
            .mime_str(&request.image.mime_type)
            .map_err(network)?;
        let form = Form::new()
            .part(IMAGE_FIELD, part)
            .text(FILTER_FIELD, request.filter_value());

        debug!(
            endpoint = %self.endpoint,
            bytes = request.image.bytes.len(),
            filter = request.filter_value(),
            "posting to OCR service"
        );
        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(network)?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(network)?;

        Ok(RawResponse {
            status,
            content_type,
            body,
        })
    }
}
