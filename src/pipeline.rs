//! ヘッドレス解析パイプライン
//!
//! ファイル → 正規化 → 送信 → 結果表示（ブラウザのアップロード経路と同じ規則）

use crate::error::Result;
use crate::source;
use scanner_common::{
    normalize_with, submit, CsvDownload, OcrRequest, OcrTransport, ProcessingMode,
    ResultPresenter, ScannerConfig, StatusMessage,
};
use std::path::Path;
use tracing::info;

/// 1枚分の解析結果
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub status: StatusMessage,
    pub text: String,
    pub csv: Option<CsvDownload>,
}

pub async fn analyze_file<T: OcrTransport>(
    path: &Path,
    mode: ProcessingMode,
    config: &ScannerConfig,
    transport: &T,
) -> Result<Analysis> {
    let buffer = source::load_image(path)?;
    let image = normalize_with(&buffer, config)?;
    info!(
        file = buffer.file_name(),
        from = ?(buffer.width(), buffer.height()),
        to = ?(image.width, image.height),
        "image normalized"
    );

    let request = OcrRequest::new(image, buffer.file_name(), mode);
    let result = submit(transport, &request).await;

    let mut presenter = ResultPresenter::new();
    let status = presenter.present(mode, &result).clone();
    Ok(Analysis {
        status,
        text: presenter.editable().to_string(),
        csv: presenter.export_csv_as(&config.csv_file_name),
    })
}
