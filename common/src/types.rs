//! 取得パイプラインの型定義
//!
//! - DeviceDescriptor: カメラ1台の識別子
//! - CaptureBuffer: アップロードまたはフレーム取得で得た生画像
//! - NormalizedImage: サイズ制限・再エンコード済みの送信用画像
//! - ProcessingMode / SessionState

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::metadata::Orientation;
use image::{ImageDecoder, ImageReader};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanError};

/// カメラ撮影時のファイル名（アップロードは元のファイル名を使う）
pub const CAMERA_FILE_NAME: &str = "captura.png";

/// canvas の既定エンコード
pub const FRAME_MIME_TYPE: &str = "image/png";

/// ビデオ入力デバイス
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub id: String,
    pub label: String,
}

impl DeviceDescriptor {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// トラックが報告するカメラの向き
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    User,
    Environment,
}

impl Facing {
    /// MediaTrackSettings.facingMode の値から
    pub fn from_facing_mode(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Facing::User),
            "environment" => Some(Facing::Environment),
            _ => None,
        }
    }
}

/// 画像の取得元
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    Upload,
    Camera,
}

/// 取得直後の画像
///
/// 一度作ったら変更しない。次の取得で置き換えられる。
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureBuffer {
    bytes: Vec<u8>,
    mime_type: String,
    width: u32,
    height: u32,
    file_name: String,
    source: ImageSource,
}

/// EXIF の向きを適用した後の寸法（90度回転なら縦横が入れ替わる）
fn upright_dimensions((width, height): (u32, u32), orientation: Orientation) -> (u32, u32) {
    match orientation {
        Orientation::Rotate90
        | Orientation::Rotate270
        | Orientation::Rotate90FlipH
        | Orientation::Rotate270FlipH => (height, width),
        _ => (width, height),
    }
}

impl CaptureBuffer {
    /// 選択されたファイルから作成
    ///
    /// 寸法はヘッダから読み、EXIF の向きを適用した後の値を持つ。
    pub fn from_upload(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<Self> {
        let mut decoder = ImageReader::new(Cursor::new(&bytes))
            .with_guessed_format()
            .map_err(|e| ScanError::Image(e.to_string()))?
            .into_decoder()?;
        let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
        let (width, height) = upright_dimensions(decoder.dimensions(), orientation);
        drop(decoder);

        Ok(Self {
            bytes,
            mime_type: mime_type.into(),
            width,
            height,
            file_name: file_name.into(),
            source: ImageSource::Upload,
        })
    }

    /// ビデオフレームから作成
    pub fn from_frame(bytes: Vec<u8>, mime_type: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
            width,
            height,
            file_name: CAMERA_FILE_NAME.to_string(),
            source: ImageSource::Camera,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// 宣言されたMIMEタイプ（空の場合あり）
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn source(&self) -> ImageSource {
        self.source
    }

    /// サムネイル表示用の Data URL
    ///
    /// アップロードと撮影の両方で同じ経路を使う。
    pub fn thumbnail_data_url(&self) -> String {
        to_data_url(&self.mime_type, &self.bytes)
    }
}

/// 送信用に正規化済みの画像
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
}

/// サーバー側の処理モード
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingMode {
    /// true: 請求書項目のみ / false: 全文
    pub filter_enabled: bool,
}

impl ProcessingMode {
    pub fn filtered() -> Self {
        Self { filter_enabled: true }
    }

    pub fn full_text() -> Self {
        Self { filter_enabled: false }
    }

    /// multipart の filter フィールド値
    pub fn as_form_value(&self) -> &'static str {
        if self.filter_enabled {
            "true"
        } else {
            "false"
        }
    }
}

/// 取得セッションの状態
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    CameraActive,
    /// フレーム取得済み、承認/取消待ち
    CapturePending,
    Submitting,
    ResultReady,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::CameraActive => "camera-active",
            SessionState::CapturePending => "capture-pending",
            SessionState::Submitting => "submitting",
            SessionState::ResultReady => "result-ready",
        }
    }
}

/// バイト列を Data URL に変換
///
/// MIME が空の場合は FileReader と同じく application/octet-stream とする。
pub fn to_data_url(mime_type: &str, bytes: &[u8]) -> String {
    let mime = if mime_type.is_empty() {
        "application/octet-stream"
    } else {
        mime_type
    };
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Data URL から Base64 部分を取り出してデコード
pub fn decode_data_url(data_url: &str) -> Result<Vec<u8>> {
    let payload = data_url
        .split_once(',')
        .map(|(_, data)| data)
        .ok_or_else(|| ScanError::Image("Data URL inválida".to_string()))?;
    STANDARD
        .decode(payload)
        .map_err(|e| ScanError::Image(e.to_string()))
}
