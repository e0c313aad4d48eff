//! 結果表示とCSV出力
//!
//! 編集可能バッファは直近の成功結果を保持する。
//! CSVはバッファ内容をそのまま書き出す（フィールド単位のエスケープはしない）。

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use tracing::info;

use crate::config::CSV_FILE_NAME;
use crate::error::ScanError;
use crate::submission::SubmissionResult;
use crate::types::ProcessingMode;

/// フィルタモードで請求書データが見つからなかった時のサーバー応答
pub const NO_INVOICE_DATA: &str = "No se encontraron datos de factura.";

pub const CSV_MIME_TYPE: &str = "text/csv";

/// encodeURI が素通しする記号以外をエンコードする集合
///
/// 英数字と `;,/?:@&=+$-_.!~*'()#` はそのまま残る。
const URI_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// 結果欄のメッセージ
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusMessage {
    Processing,
    StructuredData,
    FullText,
    NoInvoiceData,
    Failed(ScanError),
}

impl StatusMessage {
    pub fn text(&self) -> String {
        match self {
            StatusMessage::Processing => "Procesando...".to_string(),
            StatusMessage::StructuredData => "Datos extraídos correctamente.".to_string(),
            StatusMessage::FullText => "Texto completo detectado.".to_string(),
            StatusMessage::NoInvoiceData => NO_INVOICE_DATA.to_string(),
            StatusMessage::Failed(err) => err.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StatusMessage::StructuredData | StatusMessage::FullText)
    }
}

/// CSVダウンロード内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvDownload {
    pub file_name: String,
    pub mime_type: &'static str,
    pub content: String,
}

impl CsvDownload {
    /// `data:text/csv;charset=utf-8,...` を encodeURI と同じ規則でエンコード
    pub fn data_uri(&self) -> String {
        let raw = format!("data:{};charset=utf-8,{}", self.mime_type, self.content);
        utf8_percent_encode(&raw, URI_ENCODE_SET).to_string()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResultPresenter {
    editable: String,
    visible: bool,
    csv_enabled: bool,
    status: Option<StatusMessage>,
}

impl ResultPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 送信中表示
    pub fn show_processing(&mut self) {
        self.status = Some(StatusMessage::Processing);
    }

    /// 結果を反映し、表示したメッセージを返す
    pub fn present(&mut self, mode: ProcessingMode, result: &SubmissionResult) -> &StatusMessage {
        let status = match result {
            SubmissionResult::Text(text) if mode.filter_enabled && text == NO_INVOICE_DATA => {
                StatusMessage::NoInvoiceData
            }
            SubmissionResult::Text(text) => {
                self.editable = text.clone();
                self.visible = true;
                self.csv_enabled = true;
                info!(chars = text.chars().count(), "result loaded into editor");
                if mode.filter_enabled {
                    StatusMessage::StructuredData
                } else {
                    StatusMessage::FullText
                }
            }
            SubmissionResult::Error(err) => StatusMessage::Failed(err.clone()),
        };
        self.status.insert(status)
    }

    /// 利用者による編集
    pub fn set_editable(&mut self, text: impl Into<String>) {
        self.editable = text.into();
    }

    /// 表示をすべて消す
    pub fn clear(&mut self) {
        self.editable.clear();
        self.visible = false;
        self.csv_enabled = false;
        self.status = None;
    }

    pub fn editable(&self) -> &str {
        &self.editable
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn csv_enabled(&self) -> bool {
        self.csv_enabled
    }

    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    /// 現在のバッファをCSVとして出力（結果がなければ None）
    pub fn export_csv(&self) -> Option<CsvDownload> {
        self.export_csv_as(CSV_FILE_NAME)
    }

    pub fn export_csv_as(&self, file_name: &str) -> Option<CsvDownload> {
        if !self.csv_enabled {
            return None;
        }
        Some(CsvDownload {
            file_name: file_name.to_string(),
            mime_type: CSV_MIME_TYPE,
            content: self.editable.clone(),
        })
    }
}
