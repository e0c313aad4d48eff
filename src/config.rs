//! CLI設定ファイル（~/.config/invoice-scanner/config.json）
//!
//! 中身は共通の `ScannerConfig`。ファイルがなければ既定値を使う。

use crate::error::{CliError, Result};
use scanner_common::ScannerConfig;
use std::path::{Path, PathBuf};
use tracing::debug;

pub fn config_path() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CliError::Config("ホームディレクトリが見つかりません".into()))?;
    Ok(home.join(".config").join("invoice-scanner").join("config.json"))
}

pub fn load() -> Result<ScannerConfig> {
    load_from(&config_path()?)
}

pub fn load_from(path: &Path) -> Result<ScannerConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "no config file, using defaults");
        return Ok(ScannerConfig::default());
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

pub fn save(config: &ScannerConfig) -> Result<()> {
    save_to(config, &config_path()?)
}

pub fn save_to(config: &ScannerConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, ScannerConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"endpoint": "http://localhost:9000/ocr"}"#).unwrap();

        let config = load_from(&path).unwrap();
        assert_eq!(config.endpoint, "http://localhost:9000/ocr");
        assert_eq!(config.max_width, 1024);
        assert_eq!(config.csv_file_name, "factura.csv");
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = ScannerConfig::default().with_endpoint("http://example.test/ocr");

        save_to(&config, &path).unwrap();
        assert_eq!(load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_json_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_from(&path), Err(CliError::JsonParse(_))));
    }
}
