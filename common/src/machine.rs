//! 取得ステートマシン
//!
//! 利用者の操作（ファイル選択、カメラ起動/切替、撮影、承認/取消、解析、クリア）を
//! カメラセッション・正規化・送信・結果表示に振り分ける。
//!
//! 送信は `begin_submission` → (通信) → `complete_submission` の2段階。
//! 各送信に連番を振り、最新でない結果は破棄する。
//! 通信中にロックを持たずに済むよう、通信自体は呼び出し側で行える。

use tracing::{debug, info, warn};

use crate::camera::{CameraBackend, CameraSession};
use crate::config::ScannerConfig;
use crate::error::{Result, ScanError, Surface};
use crate::normalizer::normalize_with;
use crate::presenter::{CsvDownload, ResultPresenter};
use crate::submission::{submit, OcrRequest, OcrTransport, SubmissionResult};
use crate::types::{CaptureBuffer, ProcessingMode, SessionState};

/// 送信待ちのリクエスト
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionTicket {
    pub seq: u64,
    pub request: OcrRequest,
}

/// 画面描画用のスナップショット
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewSnapshot {
    pub state: SessionState,
    pub camera_active: bool,
    pub mirrored: bool,
    pub show_switch: bool,
    pub has_selection: bool,
    pub thumbnail: Option<String>,
    pub capture_preview: Option<String>,
    pub status: Option<String>,
    pub editable: String,
    pub result_visible: bool,
    pub csv_enabled: bool,
    pub filter_enabled: bool,
}

impl ViewSnapshot {
    /// 解析ボタンは選択済みかつ送信中でない時だけ出す
    pub fn show_analyze(&self) -> bool {
        self.has_selection && self.state != SessionState::Submitting
    }
}

pub struct AcquisitionMachine<B: CameraBackend> {
    camera: CameraSession<B>,
    config: ScannerConfig,
    state: SessionState,
    mode: ProcessingMode,
    selection: Option<CaptureBuffer>,
    pending_capture: Option<CaptureBuffer>,
    thumbnail: Option<String>,
    presenter: ResultPresenter,
    latest_seq: u64,
    in_flight: Option<(u64, ProcessingMode)>,
}

impl<B: CameraBackend> AcquisitionMachine<B> {
    pub fn new(backend: B, config: ScannerConfig) -> Self {
        Self {
            camera: CameraSession::new(backend),
            config,
            state: SessionState::Idle,
            mode: ProcessingMode::default(),
            selection: None,
            pending_capture: None,
            thumbnail: None,
            presenter: ResultPresenter::new(),
            latest_seq: 0,
            in_flight: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn mode(&self) -> ProcessingMode {
        self.mode
    }

    pub fn camera(&self) -> &CameraSession<B> {
        &self.camera
    }

    pub fn presenter(&self) -> &ResultPresenter {
        &self.presenter
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn set_mode(&mut self, mode: ProcessingMode) {
        self.mode = mode;
    }

    pub fn set_editable(&mut self, text: impl Into<String>) {
        self.presenter.set_editable(text);
    }

    // =============================================
    // アップロード
    // =============================================

    /// ファイル選択（None は選択解除）
    pub fn select_file(&mut self, buffer: Option<CaptureBuffer>) {
        self.thumbnail = buffer.as_ref().map(CaptureBuffer::thumbnail_data_url);
        self.selection = buffer;
    }

    /// 選択中のファイルを送信準備する
    pub fn analyze(&mut self) -> Result<SubmissionTicket> {
        let buffer = self.selection.take().ok_or(ScanError::NoImageSelected)?;
        self.begin_submission(buffer)
    }

    /// 選択・結果・プレビューをすべて消す
    ///
    /// 送信中のリクエストがあれば、その結果は破棄される。
    pub fn clear(&mut self) {
        self.selection = None;
        self.thumbnail = None;
        self.presenter.clear();
        if let Some((seq, _)) = self.in_flight.take() {
            debug!(seq, "in-flight submission invalidated by clear");
        }
        self.state = match self.state {
            SessionState::CameraActive | SessionState::CapturePending if self.camera.is_active() => {
                self.state
            }
            _ => SessionState::Idle,
        };
    }

    // =============================================
    // カメラ
    // =============================================

    pub async fn toggle_camera(&mut self) -> Result<()> {
        if self.camera.is_active() {
            self.stop_camera();
            return Ok(());
        }

        self.camera.activate().await?;
        self.state = SessionState::CameraActive;
        Ok(())
    }

    /// カメラを止め、撮影待ちの画像も破棄する（画面破棄時にも呼ぶ）
    pub fn stop_camera(&mut self) {
        self.camera.stop();
        self.pending_capture = None;
        self.leave_camera_state();
    }

    pub async fn switch_camera(&mut self) -> Result<()> {
        if !self.camera.is_active() {
            return Ok(());
        }
        self.pending_capture = None;
        match self.camera.switch_to_next().await {
            Ok(()) => {
                self.state = SessionState::CameraActive;
                Ok(())
            }
            Err(e) => {
                self.leave_camera_state();
                Err(e)
            }
        }
    }

    /// 現在のフレームを取得して承認待ちにする
    pub fn capture(&mut self) -> Result<()> {
        if self.state != SessionState::CameraActive {
            return Err(ScanError::CameraAccess(format!(
                "capture requested in state {}",
                self.state.as_str()
            )));
        }
        let frame = match self.camera.capture_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("frame capture failed: {}", e);
                if e.surface() == Surface::Inline {
                    self.presenter
                        .present(self.mode, &SubmissionResult::Error(e.clone()));
                }
                return Err(e);
            }
        };
        self.pending_capture = Some(frame);
        self.state = SessionState::CapturePending;
        Ok(())
    }

    /// 撮影画像を破棄してライブ表示に戻る
    pub fn cancel_capture(&mut self) {
        self.pending_capture = None;
        if self.camera.is_active() {
            self.state = SessionState::CameraActive;
        }
    }

    /// 撮影画像を承認して送信準備する（カメラは停止）
    pub fn accept_capture(&mut self) -> Result<SubmissionTicket> {
        let buffer = self.pending_capture.take().ok_or(ScanError::NoImageSelected)?;
        self.thumbnail = Some(buffer.thumbnail_data_url());
        self.camera.stop();
        self.begin_submission(buffer)
    }

    fn leave_camera_state(&mut self) {
        if matches!(
            self.state,
            SessionState::CameraActive | SessionState::CapturePending
        ) {
            self.state = SessionState::Idle;
        }
    }

    // =============================================
    // 送信
    // =============================================

    /// 正規化して送信チケットを発行する
    ///
    /// 正規化に失敗した場合はエラーを結果欄に出し、プレビューを片付けてから Err を返す。
    pub fn begin_submission(&mut self, buffer: CaptureBuffer) -> Result<SubmissionTicket> {
        self.presenter.show_processing();

        let image = match normalize_with(&buffer, &self.config) {
            Ok(image) => image,
            Err(e) => {
                warn!(file = buffer.file_name(), "normalization failed: {}", e);
                self.presenter
                    .present(self.mode, &SubmissionResult::Error(e.clone()));
                self.reset_capture();
                self.state = SessionState::ResultReady;
                return Err(e);
            }
        };

        self.latest_seq += 1;
        let seq = self.latest_seq;
        self.in_flight = Some((seq, self.mode));
        self.state = SessionState::Submitting;
        info!(seq, source = ?buffer.source(), "submission started");

        Ok(SubmissionTicket {
            seq,
            request: OcrRequest::new(image, buffer.file_name(), self.mode),
        })
    }

    /// 送信結果を反映する。最新の送信でなければ破棄して false
    pub fn complete_submission(&mut self, seq: u64, result: SubmissionResult) -> bool {
        let mode = match self.in_flight {
            Some((current, mode)) if current == seq => mode,
            _ => {
                debug!(seq, latest = self.latest_seq, "stale submission result discarded");
                return false;
            }
        };
        self.in_flight = None;

        let status = self.presenter.present(mode, &result);
        info!(seq, success = status.is_success(), "submission finished");

        self.reset_capture();
        if self.state == SessionState::Submitting {
            self.state = SessionState::ResultReady;
        }
        true
    }

    /// チケットを送信し、結果を反映する
    pub async fn run_submission<T: OcrTransport>(
        &mut self,
        ticket: SubmissionTicket,
        transport: &T,
    ) -> bool {
        let result = submit(transport, &ticket.request).await;
        self.complete_submission(ticket.seq, result)
    }

    fn reset_capture(&mut self) {
        self.selection = None;
        self.thumbnail = None;
    }

    // =============================================
    // 出力
    // =============================================

    pub fn export_csv(&self) -> Option<CsvDownload> {
        self.presenter.export_csv_as(&self.config.csv_file_name)
    }

    pub fn snapshot(&self, viewport_width: u32) -> ViewSnapshot {
        ViewSnapshot {
            state: self.state,
            camera_active: self.camera.is_active(),
            mirrored: self.camera.is_mirrored(),
            show_switch: self.camera.is_active()
                && self
                    .config
                    .offers_camera_switch(viewport_width, self.camera.devices().len()),
            has_selection: self.selection.is_some(),
            thumbnail: self.thumbnail.clone(),
            capture_preview: self
                .pending_capture
                .as_ref()
                .map(CaptureBuffer::thumbnail_data_url),
            status: self.presenter.status().map(|s| s.text()),
            editable: self.presenter.editable().to_string(),
            result_visible: self.presenter.is_visible(),
            csv_enabled: self.presenter.csv_enabled(),
            filter_enabled: self.mode.filter_enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::io::Cursor;

    use super::*;
    use crate::camera::testing::MockCamera;
    use crate::presenter::NO_INVOICE_DATA;
    use crate::submission::RawResponse;
    use crate::types::CAMERA_FILE_NAME;
    use futures::executor::block_on;
    use image::{ImageFormat, RgbImage};

    struct MockTransport {
        response: std::result::Result<RawResponse, ScanError>,
        requests: RefCell<Vec<OcrRequest>>,
    }

    impl MockTransport {
        fn json(status: u16, body: &str) -> Self {
            Self {
                response: Ok(RawResponse {
                    status,
                    content_type: Some("application/json".to_string()),
                    body: body.to_string(),
                }),
                requests: RefCell::new(Vec::new()),
            }
        }

        fn unreachable() -> Self {
            Self {
                response: Err(ScanError::Network("connection refused".to_string())),
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl OcrTransport for MockTransport {
        async fn post(&self, request: &OcrRequest) -> std::result::Result<RawResponse, ScanError> {
            self.requests.borrow_mut().push(request.clone());
            self.response.clone()
        }
    }

    fn png_upload(name: &str, width: u32, height: u32) -> CaptureBuffer {
        let mut out = Cursor::new(Vec::new());
        RgbImage::new(width, height)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        CaptureBuffer::from_upload(name, "image/png", out.into_inner()).unwrap()
    }

    fn machine(devices: usize) -> (AcquisitionMachine<MockCamera>, MockCamera) {
        let camera = MockCamera::with_devices(devices);
        (
            AcquisitionMachine::new(camera.clone(), ScannerConfig::default()),
            camera,
        )
    }

    // =============================================
    // アップロード経路
    // =============================================

    #[test]
    fn test_upload_flow() {
        let (mut machine, _) = machine(0);
        let transport = MockTransport::json(200, r#"{"text":"Hello"}"#);

        machine.select_file(Some(png_upload("factura.png", 2048, 1024)));
        assert!(machine.snapshot(1280).show_analyze());
        assert!(machine.snapshot(1280).thumbnail.unwrap().starts_with("data:image/png;base64,"));

        let ticket = machine.analyze().unwrap();
        assert_eq!(machine.state(), SessionState::Submitting);
        assert_eq!(machine.snapshot(1280).status.as_deref(), Some("Procesando..."));
        assert!(!machine.snapshot(1280).show_analyze());

        assert!(block_on(machine.run_submission(ticket, &transport)));

        let sent = transport.requests.borrow();
        assert_eq!(sent[0].file_name, "factura.png");
        assert_eq!((sent[0].image.width, sent[0].image.height), (1024, 512));
        assert_eq!(sent[0].filter_value(), "false");

        let view = machine.snapshot(1280);
        assert_eq!(view.state, SessionState::ResultReady);
        assert_eq!(view.editable, "Hello");
        assert_eq!(view.status.as_deref(), Some("Texto completo detectado."));
        assert!(view.csv_enabled);
        assert!(view.thumbnail.is_none());
        assert!(!view.has_selection);
    }

    #[test]
    fn test_analyze_without_selection() {
        let (mut machine, _) = machine(0);
        let err = machine.analyze().unwrap_err();
        assert_eq!(err, ScanError::NoImageSelected);
        assert_eq!(machine.state(), SessionState::Idle);
        assert!(machine.presenter().status().is_none());
    }

    #[test]
    fn test_filtered_sentinel_is_not_success() {
        let (mut machine, _) = machine(0);
        let transport = MockTransport::json(200, &format!(r#"{{"text":"{}"}}"#, NO_INVOICE_DATA));
        machine.set_mode(ProcessingMode::filtered());
        machine.select_file(Some(png_upload("a.png", 10, 10)));

        let ticket = machine.analyze().unwrap();
        assert_eq!(ticket.request.filter_value(), "true");
        block_on(machine.run_submission(ticket, &transport));

        let view = machine.snapshot(1280);
        assert_eq!(view.status.as_deref(), Some(NO_INVOICE_DATA));
        assert!(!view.csv_enabled);
        assert!(machine.export_csv().is_none());
    }

    #[test]
    fn test_network_failure_is_inline() {
        let (mut machine, _) = machine(0);
        machine.select_file(Some(png_upload("a.png", 10, 10)));
        let ticket = machine.analyze().unwrap();
        block_on(machine.run_submission(ticket, &MockTransport::unreachable()));

        let view = machine.snapshot(1280);
        assert_eq!(view.state, SessionState::ResultReady);
        assert_eq!(
            view.status.as_deref(),
            Some("Error de red o CORS al procesar la imagen.")
        );
        assert!(!view.result_visible);
    }

    #[test]
    fn test_server_error_message() {
        let (mut machine, _) = machine(0);
        machine.select_file(Some(png_upload("a.png", 10, 10)));
        let ticket = machine.analyze().unwrap();
        block_on(machine.run_submission(ticket, &MockTransport::json(400, r#"{"error":"bad image"}"#)));
        assert_eq!(machine.snapshot(1280).status.as_deref(), Some("bad image"));
    }

    #[test]
    fn test_normalization_failure_tears_down() {
        // 上限0では正規化できない
        let config = ScannerConfig {
            max_width: 0,
            ..ScannerConfig::default()
        };
        let mut machine = AcquisitionMachine::new(MockCamera::with_devices(0), config);

        machine.select_file(Some(png_upload("roto.png", 64, 64)));
        let err = machine.analyze().unwrap_err();
        assert!(matches!(err, ScanError::Image(_)));

        let view = machine.snapshot(1280);
        assert_eq!(view.state, SessionState::ResultReady);
        assert!(view.thumbnail.is_none());
        assert!(!view.has_selection);
        assert!(view.status.unwrap().starts_with("No se pudo procesar la imagen"));
    }

    // =============================================
    // カメラ経路
    // =============================================

    #[test]
    fn test_camera_capture_accept_flow() {
        let (mut machine, camera) = machine(2);
        let transport = MockTransport::json(200, r#"{"text":"Total,10.00"}"#);
        machine.set_mode(ProcessingMode::filtered());

        block_on(machine.toggle_camera()).unwrap();
        assert_eq!(machine.state(), SessionState::CameraActive);
        assert!(machine.snapshot(390).show_switch);
        assert!(!machine.snapshot(1280).show_switch);

        machine.capture().unwrap();
        assert_eq!(machine.state(), SessionState::CapturePending);
        assert!(machine.snapshot(390).capture_preview.is_some());

        let ticket = machine.accept_capture().unwrap();
        assert!(!machine.camera().is_active());
        assert!(camera.state().live.is_empty());
        assert_eq!(ticket.request.file_name, CAMERA_FILE_NAME);
        assert_eq!((ticket.request.image.width, ticket.request.image.height), (1024, 768));
        assert!(machine.snapshot(390).thumbnail.is_some());

        block_on(machine.run_submission(ticket, &transport));
        let view = machine.snapshot(390);
        assert_eq!(view.state, SessionState::ResultReady);
        assert_eq!(view.status.as_deref(), Some("Datos extraídos correctamente."));
        assert_eq!(view.editable, "Total,10.00");
        assert!(view.capture_preview.is_none());
    }

    #[test]
    fn test_cancel_returns_to_live_view() {
        let (mut machine, _) = machine(1);
        block_on(machine.toggle_camera()).unwrap();
        machine.capture().unwrap();
        machine.cancel_capture();

        assert_eq!(machine.state(), SessionState::CameraActive);
        assert!(machine.snapshot(390).capture_preview.is_none());
        assert!(machine.camera().is_active());
    }

    #[test]
    fn test_capture_requires_live_camera() {
        let (mut machine, _) = machine(1);
        assert!(matches!(machine.capture(), Err(ScanError::CameraAccess(_))));
    }

    #[test]
    fn test_capture_failure_is_shown_inline() {
        let (mut machine, camera) = machine(1);
        block_on(machine.toggle_camera()).unwrap();
        camera.state_mut().fail_grab = true;

        let err = machine.capture().unwrap_err();
        assert!(matches!(err, ScanError::Image(_)));

        let view = machine.snapshot(390);
        assert_eq!(view.state, SessionState::CameraActive);
        assert_eq!(view.status.as_deref(), Some(err.to_string().as_str()));
        assert!(view.capture_preview.is_none());
        assert_eq!(camera.state().live.len(), 1);

        camera.state_mut().fail_grab = false;
        machine.capture().unwrap();
        assert_eq!(machine.state(), SessionState::CapturePending);
    }

    #[test]
    fn test_camera_denied_keeps_toggle_available() {
        let (mut machine, camera) = machine(1);
        camera.state_mut().deny_access = true;

        let err = block_on(machine.toggle_camera()).unwrap_err();
        assert!(matches!(err, ScanError::CameraAccess(_)));
        assert_eq!(machine.state(), SessionState::Idle);

        camera.state_mut().deny_access = false;
        block_on(machine.toggle_camera()).unwrap();
        assert_eq!(machine.state(), SessionState::CameraActive);
    }

    #[test]
    fn test_toggle_off_discards_pending_capture() {
        let (mut machine, camera) = machine(1);
        block_on(machine.toggle_camera()).unwrap();
        machine.capture().unwrap();
        block_on(machine.toggle_camera()).unwrap();

        assert_eq!(machine.state(), SessionState::Idle);
        assert!(machine.snapshot(390).capture_preview.is_none());
        assert!(camera.state().live.is_empty());
    }

    #[test]
    fn test_toggle_off_keeps_upload_and_result() {
        let (mut machine, _) = machine(1);
        let transport = MockTransport::json(200, r#"{"text":"Hello"}"#);
        machine.select_file(Some(png_upload("factura.png", 64, 64)));
        let ticket = machine.analyze().unwrap();
        assert!(block_on(machine.run_submission(ticket, &transport)));

        block_on(machine.toggle_camera()).unwrap();
        machine.select_file(Some(png_upload("otra.png", 32, 32)));
        machine.capture().unwrap();
        block_on(machine.toggle_camera()).unwrap();

        let view = machine.snapshot(390);
        assert_eq!(view.state, SessionState::Idle);
        assert!(view.capture_preview.is_none());
        assert!(view.has_selection);
        assert_eq!(view.editable, "Hello");
        assert!(machine.export_csv().is_some());

        machine.clear();
        let view = machine.snapshot(390);
        assert!(!view.has_selection);
        assert!(machine.export_csv().is_none());
    }

    #[test]
    fn test_switch_camera_failure_returns_to_idle() {
        let (mut machine, camera) = machine(2);
        block_on(machine.toggle_camera()).unwrap();
        camera.state_mut().deny_access = true;

        assert!(block_on(machine.switch_camera()).is_err());
        assert_eq!(machine.state(), SessionState::Idle);
        assert!(camera.state().live.is_empty());
    }

    // =============================================
    // 連番による古い結果の破棄
    // =============================================

    #[test]
    fn test_stale_result_is_discarded() {
        let (mut machine, _) = machine(0);

        machine.select_file(Some(png_upload("primera.png", 10, 10)));
        let first = machine.analyze().unwrap();
        machine.select_file(Some(png_upload("segunda.png", 10, 10)));
        let second = machine.analyze().unwrap();
        assert!(second.seq > first.seq);

        // 古い結果が後から届いても反映しない
        assert!(!machine.complete_submission(first.seq, SubmissionResult::Text("vieja".into())));
        assert_eq!(machine.state(), SessionState::Submitting);

        assert!(machine.complete_submission(second.seq, SubmissionResult::Text("nueva".into())));
        assert_eq!(machine.presenter().editable(), "nueva");

        // 同じ結果の二重反映もしない
        assert!(!machine.complete_submission(second.seq, SubmissionResult::Text("otra".into())));
        assert_eq!(machine.presenter().editable(), "nueva");
    }

    #[test]
    fn test_clear_invalidates_in_flight_submission() {
        let (mut machine, _) = machine(0);
        machine.select_file(Some(png_upload("a.png", 10, 10)));
        let ticket = machine.analyze().unwrap();

        machine.clear();
        assert_eq!(machine.state(), SessionState::Idle);

        assert!(!machine.complete_submission(ticket.seq, SubmissionResult::Text("tarde".into())));
        assert_eq!(machine.presenter().editable(), "");
        assert!(machine.presenter().status().is_none());
    }

    #[test]
    fn test_result_for_latest_request_does_not_leave_camera_state() {
        let (mut machine, _) = machine(1);
        machine.select_file(Some(png_upload("a.png", 10, 10)));
        let ticket = machine.analyze().unwrap();

        block_on(machine.toggle_camera()).unwrap();
        assert!(machine.complete_submission(ticket.seq, SubmissionResult::Text("ok".into())));
        assert_eq!(machine.state(), SessionState::CameraActive);
        assert_eq!(machine.presenter().editable(), "ok");
    }

    #[test]
    fn test_clear_resets_everything() {
        let (mut machine, _) = machine(0);
        machine.select_file(Some(png_upload("a.png", 10, 10)));
        let ticket = machine.analyze().unwrap();
        machine.complete_submission(ticket.seq, SubmissionResult::Text("A,B".into()));
        assert!(machine.export_csv().is_some());

        machine.clear();
        let view = machine.snapshot(1280);
        assert_eq!(view.state, SessionState::Idle);
        assert!(view.status.is_none());
        assert!(view.editable.is_empty());
        assert!(!view.csv_enabled);
        assert!(machine.export_csv().is_none());
    }

    #[test]
    fn test_export_csv_uses_configured_name() {
        let camera = MockCamera::with_devices(0);
        let config = ScannerConfig {
            csv_file_name: "datos.csv".to_string(),
            ..ScannerConfig::default()
        };
        let mut machine = AcquisitionMachine::new(camera, config);
        machine.select_file(Some(png_upload("a.png", 10, 10)));
        let ticket = machine.analyze().unwrap();
        machine.complete_submission(ticket.seq, SubmissionResult::Text("A,B\nC,D".into()));
        machine.set_editable("A,B\nC,E");

        let csv = machine.export_csv().unwrap();
        assert_eq!(csv.file_name, "datos.csv");
        assert_eq!(csv.content, "A,B\nC,E");
    }
}
