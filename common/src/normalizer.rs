//! 送信前の画像正規化
//!
//! 最大寸法に収まるよう縮小し（拡大はしない）、再エンコードする。
//! 同じ入力と上限に対して常に同じ出力を返す。

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader};
use tracing::debug;

use crate::config::ScannerConfig;
use crate::error::{Result, ScanError};
use crate::types::{CaptureBuffer, NormalizedImage};

/// MIME不明・非対応時の出力形式
pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";

/// 上限内に収まる寸法を計算
///
/// 既に収まっている場合はそのまま返す。
/// 縮小時は制約側の辺を上限に合わせ、もう一方を縦横比から導出して丸める
/// （両辺を独立に計算すると比率がずれるため）。
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }

    let width_scale = max_width as f64 / width as f64;
    let height_scale = max_height as f64 / height as f64;

    if width_scale <= height_scale {
        let derived = (max_width as f64 * height as f64 / width as f64).round() as u32;
        (max_width, derived.max(1).min(max_height))
    } else {
        let derived = (max_height as f64 * width as f64 / height as f64).round() as u32;
        (derived.max(1).min(max_width), max_height)
    }
}

/// デコードして EXIF の向きを適用する（スマホ写真は横倒しで保存されていることが多い）
fn decode_upright(bytes: &[u8]) -> Result<DynamicImage> {
    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ScanError::Image(e.to_string()))?
        .into_decoder()?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let mut image = DynamicImage::from_decoder(decoder)?;
    image.apply_orientation(orientation);
    Ok(image)
}

/// 出力形式を決める
///
/// JPEG と WebP は元の形式のまま。MIME未指定・未知の型は JPEG、そのまま書けない既知の型（GIF, BMP, TIFF など）は PNG。
fn output_format(mime_type: &str) -> (ImageFormat, &'static str) {
    match ImageFormat::from_mime_type(mime_type) {
        Some(ImageFormat::Jpeg) | None => (ImageFormat::Jpeg, DEFAULT_MIME_TYPE),
        Some(ImageFormat::WebP) => (ImageFormat::WebP, "image/webp"),
        Some(_) => (ImageFormat::Png, "image/png"),
    }
}

fn encode(image: &DynamicImage, format: ImageFormat, jpeg_quality: u8) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    match format {
        ImageFormat::Jpeg => {
            // JPEGはアルファ非対応
            let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, jpeg_quality))?;
        }
        ImageFormat::Png => image.write_to(&mut out, ImageFormat::Png)?,
        other => DynamicImage::ImageRgba8(image.to_rgba8()).write_to(&mut out, other)?,
    }
    Ok(out.into_inner())
}

/// CaptureBuffer を送信用に正規化
pub fn normalize(
    buffer: &CaptureBuffer,
    max_width: u32,
    max_height: u32,
    jpeg_quality: u8,
) -> Result<NormalizedImage> {
    if max_width == 0 || max_height == 0 {
        return Err(ScanError::Image(format!(
            "límites inválidos {}x{}",
            max_width, max_height
        )));
    }

    let decoded = decode_upright(buffer.bytes())?;
    let (src_width, src_height) = (decoded.width(), decoded.height());
    if src_width == 0 || src_height == 0 {
        return Err(ScanError::Image("imagen vacía".to_string()));
    }

    let (width, height) = fit_within(src_width, src_height, max_width, max_height);
    let resized = if (width, height) == (src_width, src_height) {
        decoded
    } else {
        decoded.resize_exact(width, height, FilterType::Triangle)
    };

    let (format, mime_type) = output_format(buffer.mime_type());
    let bytes = encode(&resized, format, jpeg_quality)?;

    debug!(
        file = buffer.file_name(),
        from = %format!("{}x{}", src_width, src_height),
        to = %format!("{}x{}", width, height),
        mime = mime_type,
        size = bytes.len(),
        "image normalized"
    );

    Ok(NormalizedImage {
        bytes,
        mime_type: mime_type.to_string(),
        width,
        height,
    })
}

/// 設定値の上限で正規化
pub fn normalize_with(buffer: &CaptureBuffer, config: &ScannerConfig) -> Result<NormalizedImage> {
    normalize(buffer, config.max_width, config.max_height, config.jpeg_quality)
}
