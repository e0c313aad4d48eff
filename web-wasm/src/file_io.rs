//! ファイル入力の読み込み

use js_sys::Uint8Array;
use scanner_common::{CaptureBuffer, Result, ScanError};
use tracing::debug;
use wasm_bindgen_futures::JsFuture;
use web_sys::File;

use crate::describe_js;

/// 選択されたファイルを読み込み、寸法を確認した CaptureBuffer にする
pub async fn read_file(file: &File) -> Result<CaptureBuffer> {
    let buffer = JsFuture::from(file.array_buffer())
        .await
        .map_err(|e| ScanError::Image(describe_js(&e)))?;
    let bytes = Uint8Array::new(&buffer).to_vec();
    debug!(name = %file.name(), size = bytes.len(), "file read");
    CaptureBuffer::from_upload(file.name(), file.type_(), bytes)
}
