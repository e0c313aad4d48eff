//! Invoice Scanner (headless)
//!
//! ブラウザ版と同じ取得・送信パイプラインをコマンドラインから実行する。

pub mod cli;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod source;
pub mod transport;
