//! OCRサービス連携（fetch + multipart/form-data）
//!
//! `image` フィールドに正規化済み画像、`filter` フィールドに "true"/"false" を載せて POST する。
//! 応答の解釈は共通ライブラリの `interpret_response` が行う。

use js_sys::{Array, Uint8Array};
use scanner_common::submission::{FILTER_FIELD, IMAGE_FIELD};
use scanner_common::{OcrRequest, OcrTransport, RawResponse, ScanError};
use tracing::debug;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Blob, BlobPropertyBag, FormData, Request, RequestInit, RequestMode, Response};

use crate::describe_js;

/// ブラウザの fetch を使う送信経路
#[derive(Debug, Clone)]
pub struct FetchTransport {
    endpoint: String,
}

impl FetchTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

fn network(err: JsValue) -> ScanError {
    ScanError::Network(describe_js(&err))
}

/// 本文の組み立て失敗は通信前の画像側の問題
fn form_error(err: JsValue) -> ScanError {
    ScanError::Image(describe_js(&err))
}

/// multipart 本文を組み立てる
pub(crate) fn build_form(request: &OcrRequest) -> Result<FormData, JsValue> {
    let bytes = Uint8Array::from(request.image.bytes.as_slice());
    let parts = Array::of1(&bytes);

    let props = BlobPropertyBag::new();
    props.set_type(&request.image.mime_type);
    let blob = Blob::new_with_u8_array_sequence_and_options(&parts, &props)?;

    let form = FormData::new()?;
    form.append_with_blob_and_filename(IMAGE_FIELD, &blob, &request.file_name)?;
    form.append_with_str(FILTER_FIELD, request.filter_value())?;
    Ok(form)
}

impl OcrTransport for FetchTransport {
    async fn post(&self, request: &OcrRequest) -> Result<RawResponse, ScanError> {
        let form = build_form(request).map_err(form_error)?;

        let opts = RequestInit::new();
        opts.set_method("POST");
        opts.set_mode(RequestMode::Cors);
        opts.set_body(&form);

        let fetch_request = Request::new_with_str_and_init(&self.endpoint, &opts).map_err(network)?;
        debug!(
            endpoint = %self.endpoint,
            bytes = request.image.bytes.len(),
            filter = request.filter_value(),
            "posting to OCR service"
        );

        let window = gloo::utils::window();
        let resp_value = JsFuture::from(window.fetch_with_request(&fetch_request))
            .await
            .map_err(network)?;
        let resp: Response = resp_value.dyn_into().map_err(network)?;

        let content_type = resp.headers().get("content-type").ok().flatten();
        let body = JsFuture::from(resp.text().map_err(network)?)
            .await
            .map_err(network)?
            .as_string()
            .unwrap_or_default();

        Ok(RawResponse {
            status: resp.status(),
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanner_common::{NormalizedImage, ProcessingMode};
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn request(mode: ProcessingMode) -> OcrRequest {
        let image = NormalizedImage {
            bytes: vec![0xFF, 0xD8, 0xFF, 0xD9],
            mime_type: "image/jpeg".to_string(),
            width: 1,
            height: 1,
        };
        OcrRequest::new(image, "factura.jpg", mode)
    }

    #[wasm_bindgen_test]
    fn form_carries_filter_flag() {
        let form = build_form(&request(ProcessingMode::filtered())).unwrap();
        assert_eq!(form.get(FILTER_FIELD).as_string().as_deref(), Some("true"));

        let form = build_form(&request(ProcessingMode::full_text())).unwrap();
        assert_eq!(form.get(FILTER_FIELD).as_string().as_deref(), Some("false"));
    }

    #[wasm_bindgen_test]
    fn form_image_keeps_file_name_and_type() {
        let form = build_form(&request(ProcessingMode::default())).unwrap();
        let file: web_sys::File = form.get(IMAGE_FIELD).dyn_into().unwrap();
        assert_eq!(file.name(), "factura.jpg");
        assert_eq!(file.type_(), "image/jpeg");
        assert_eq!(file.size(), 4.0);
    }

    #[wasm_bindgen_test]
    fn form_failure_is_not_reported_as_network() {
        let err = form_error(JsValue::from_str("TypeError: Blob construction failed"));
        assert!(matches!(err, ScanError::Image(_)));
        assert_ne!(err.to_string(), ScanError::Network(String::new()).to_string());
    }
}
