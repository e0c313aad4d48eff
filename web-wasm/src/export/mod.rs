//! エクスポート

pub mod csv_download;
