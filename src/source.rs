//! 画像ファイルの読み込み

use crate::error::{CliError, Result};
use image::ImageFormat;
use scanner_common::CaptureBuffer;
use std::path::Path;
use tracing::debug;

/// 拡張子、なければ中身からMIMEタイプを決める
fn mime_for(path: &Path, bytes: &[u8]) -> Option<&'static str> {
    let format = ImageFormat::from_path(path)
        .ok()
        .or_else(|| image::guess_format(bytes).ok())?;
    Some(format.to_mime_type())
}

/// 画像ファイルを CaptureBuffer として読み込む
pub fn load_image(path: &Path) -> Result<CaptureBuffer> {
    if !path.is_file() {
        return Err(CliError::FileNotFound(path.display().to_string()));
    }

    let bytes = std::fs::read(path)?;
    let mime_type = mime_for(path, &bytes)
        .ok_or_else(|| CliError::UnsupportedImage(path.display().to_string()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    debug!(file = %file_name, mime_type, size = bytes.len(), "image loaded");
    Ok(CaptureBuffer::from_upload(file_name, mime_type, bytes)?)
}
