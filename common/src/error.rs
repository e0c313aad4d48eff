//! エラー型定義

use thiserror::Error;

/// サーバー応答が不正・エラー本文なしの場合の汎用メッセージ
pub const GENERIC_SERVER_ERROR: &str = "Error del servidor al procesar la imagen.";

/// 取得・送信パイプラインの共通エラー型
///
/// Display はそのまま利用者に見せる文言（スペイン語）。
/// 詳細はフィールドに保持し、ログにのみ出す。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// カメラ権限拒否・該当デバイスなし
    #[error("No se pudo acceder a la cámara. Verifica los permisos.")]
    CameraAccess(String),

    /// 画像未選択のまま解析ボタンが押された
    #[error("Por favor, selecciona una imagen.")]
    NoImageSelected,

    /// リクエストが完了しなかった（ネットワーク/CORS）
    #[error("Error de red o CORS al procesar la imagen.")]
    Network(String),

    /// 非2xx応答、または不正なペイロード
    #[error("{0}")]
    Server(String),

    /// 画像のデコード・再エンコード失敗
    #[error("No se pudo procesar la imagen: {0}")]
    Image(String),
}

/// エラーの表示先
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    /// ダイアログ（alert）で通知、状態は変えない
    Alert,
    /// 結果欄にインライン表示
    Inline,
}

impl ScanError {
    pub fn surface(&self) -> Surface {
        match self {
            ScanError::CameraAccess(_) | ScanError::NoImageSelected => Surface::Alert,
            ScanError::Network(_) | ScanError::Server(_) | ScanError::Image(_) => Surface::Inline,
        }
    }

    /// 汎用メッセージでのサーバーエラー
    pub fn generic_server() -> Self {
        ScanError::Server(GENERIC_SERVER_ERROR.to_string())
    }
}

impl From<image::ImageError> for ScanError {
    fn from(err: image::ImageError) -> Self {
        ScanError::Image(err.to_string())
    }
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, ScanError>;
