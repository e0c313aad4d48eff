//! Invoice Scanner Common Library
//!
//! ブラウザ版(WASM)とヘッドレス版で共有する取得・送信パイプライン
//!
//! カメラ/ファイル → CaptureBuffer → 正規化 → OCR送信 → 結果表示・CSV

pub mod types;
pub mod config;
pub mod error;
pub mod normalizer;
pub mod submission;
pub mod presenter;
pub mod camera;
pub mod machine;

pub use types::{
    CaptureBuffer, DeviceDescriptor, Facing, ImageSource, NormalizedImage, ProcessingMode,
    SessionState,
};
pub use config::ScannerConfig;
pub use error::{Result, ScanError, Surface};
pub use normalizer::{fit_within, normalize, normalize_with};
pub use submission::{interpret_response, submit, OcrRequest, OcrTransport, RawResponse, SubmissionResult};
pub use presenter::{CsvDownload, ResultPresenter, StatusMessage, NO_INVOICE_DATA};
pub use camera::{CameraBackend, CameraSession, StreamRequest};
pub use machine::{AcquisitionMachine, SubmissionTicket, ViewSnapshot};
