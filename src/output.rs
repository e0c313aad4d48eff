//! CSVの書き出し

use crate::error::Result;
use scanner_common::CsvDownload;
use std::path::{Path, PathBuf};
use tracing::info;

/// 出力先がディレクトリなら CSV 既定名で、そうでなければそのパスに書く
pub fn write_csv(csv: &CsvDownload, target: &Path) -> Result<PathBuf> {
    let path = if target.is_dir() {
        target.join(&csv.file_name)
    } else {
        target.to_path_buf()
    };
    std::fs::write(&path, csv.content.as_bytes())?;
    info!(path = %path.display(), "CSV written");
    Ok(path)
}
