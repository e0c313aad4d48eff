//! スキャナ設定
//!
//! ブラウザ版はすべて既定値（コンパイル時定数）を使う。
//! ヘッドレス版はCLI引数で一部を上書きする。

use serde::{Deserialize, Serialize};

/// OCRエンドポイント
pub const OCR_ENDPOINT: &str = "https://scanner-v3-1.onrender.com/ocr";

/// 送信前の最大幅・高さ（px）
pub const MAX_DIMENSION: u32 = 1024;

/// MIME不明時のJPEG品質（0-100）
pub const JPEG_QUALITY: u8 = 90;

/// CSVダウンロードのファイル名
pub const CSV_FILE_NAME: &str = "factura.csv";

/// これ未満のビューポート幅をモバイルとみなす
pub const MOBILE_BREAKPOINT_PX: u32 = 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScannerConfig {
    pub endpoint: String,
    pub max_width: u32,
    pub max_height: u32,
    pub jpeg_quality: u8,
    pub csv_file_name: String,
    pub mobile_breakpoint_px: u32,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            endpoint: OCR_ENDPOINT.to_string(),
            max_width: MAX_DIMENSION,
            max_height: MAX_DIMENSION,
            jpeg_quality: JPEG_QUALITY,
            csv_file_name: CSV_FILE_NAME.to_string(),
            mobile_breakpoint_px: MOBILE_BREAKPOINT_PX,
        }
    }
}

impl ScannerConfig {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// カメラ切替ボタンを出すか（モバイル幅かつ複数カメラ）
    pub fn offers_camera_switch(&self, viewport_width: u32, device_count: usize) -> bool {
        viewport_width < self.mobile_breakpoint_px && device_count > 1
    }
}
