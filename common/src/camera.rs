//! カメラセッション管理
//!
//! ストリームの取得・解放、オートフォーカス、ミラー表示の判定を行う。
//! ハードウェアへのアクセスは `CameraBackend` 実装（ブラウザでは MediaDevices）に委譲する。
//! ストリームは常に高々1本で、新しいストリームを開く前に必ず前のものを解放する。

use tracing::{debug, info, warn};

use crate::error::{Result, ScanError};
use crate::types::{CaptureBuffer, DeviceDescriptor, Facing};

/// ストリーム要求
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamRequest {
    /// 指定デバイス（完全一致）
    Device(String),
    /// 背面（environment）カメラ
    Environment,
}

/// プラットフォームのカメラ操作
#[allow(async_fn_in_trait)]
pub trait CameraBackend {
    type Stream;

    /// ビデオ入力デバイス一覧
    async fn list_video_inputs(&self) -> Result<Vec<DeviceDescriptor>>;

    /// ストリームを取得
    async fn open(&mut self, request: &StreamRequest) -> Result<Self::Stream>;

    /// ビデオ面に接続し、メタデータが読めるまで待つ
    async fn attach(&mut self, stream: &Self::Stream) -> Result<()>;

    /// 連続オートフォーカスを有効化。トラックが対応していなければ Ok(false)
    async fn enable_continuous_focus(&mut self, stream: &Self::Stream) -> Result<bool>;

    /// トラックが報告する向き（不明なら None）
    fn facing(&self, stream: &Self::Stream) -> Option<Facing>;

    fn set_mirrored(&mut self, mirrored: bool);

    /// 現在表示中のフレームを取得
    fn grab_frame(&self, stream: &Self::Stream) -> Result<CaptureBuffer>;

    /// 全トラックを停止
    fn release(&mut self, stream: Self::Stream);

    /// ビデオ面から切り離す
    fn detach(&mut self);
}

fn camera_access(err: ScanError) -> ScanError {
    match err {
        ScanError::CameraAccess(_) => err,
        other => ScanError::CameraAccess(format!("{:?}", other)),
    }
}

pub struct CameraSession<B: CameraBackend> {
    backend: B,
    stream: Option<B::Stream>,
    devices: Vec<DeviceDescriptor>,
    current_index: usize,
    mirrored: bool,
}

impl<B: CameraBackend> CameraSession<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            stream: None,
            devices: Vec::new(),
            current_index: 0,
            mirrored: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.stream.is_some()
    }

    pub fn devices(&self) -> &[DeviceDescriptor] {
        &self.devices
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn is_mirrored(&self) -> bool {
        self.mirrored
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// カメラを起動する
    ///
    /// デバイス一覧はここでのみ取得する（起動中に接続されたデバイスは次回の起動まで見えない）。
    pub async fn activate(&mut self) -> Result<()> {
        self.devices = match self.backend.list_video_inputs().await {
            Ok(devices) => devices,
            Err(e) => {
                warn!("device enumeration failed, continuing without devices: {}", e);
                Vec::new()
            }
        };
        self.current_index = 0;
        info!(devices = self.devices.len(), "camera activation");
        self.start(None).await
    }

    /// 起動/停止を切り替え、切替後に起動中なら true
    pub async fn toggle(&mut self) -> Result<bool> {
        if self.is_active() {
            self.stop();
            Ok(false)
        } else {
            self.activate().await?;
            Ok(true)
        }
    }

    /// ストリームを開始する
    ///
    /// 失敗時は取得済みのストリームを解放してから CameraAccess を返す。
    pub async fn start(&mut self, device_id: Option<&str>) -> Result<()> {
        self.stop();

        let request = match device_id {
            Some(id) => StreamRequest::Device(id.to_string()),
            None => StreamRequest::Environment,
        };

        let stream = self.backend.open(&request).await.map_err(camera_access)?;

        if let Err(e) = self.backend.attach(&stream).await {
            self.backend.release(stream);
            self.backend.detach();
            return Err(camera_access(e));
        }

        match self.backend.enable_continuous_focus(&stream).await {
            Ok(true) => info!("continuous autofocus enabled"),
            Ok(false) => debug!("track does not advertise focusMode"),
            Err(e) => warn!("could not enable autofocus: {}", e),
        }

        // facingMode が取れない端末向けに、先頭以外のデバイスは前面とみなす
        let mirrored = self.backend.facing(&stream) == Some(Facing::User) || self.current_index != 0;
        self.backend.set_mirrored(mirrored);
        self.mirrored = mirrored;
        self.stream = Some(stream);

        info!(?request, mirrored, "camera stream started");
        Ok(())
    }

    /// ストリームを停止する（停止済みなら何もしない）
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            self.backend.release(stream);
            self.backend.detach();
            self.mirrored = false;
            info!("camera stream stopped");
        }
    }

    /// 次のカメラへ切り替える（ラウンドロビン）
    pub async fn switch_to_next(&mut self) -> Result<()> {
        if self.devices.is_empty() {
            return Ok(());
        }
        self.current_index = (self.current_index + 1) % self.devices.len();
        let device_id = self.devices[self.current_index].id.clone();
        self.start(Some(&device_id)).await
    }

    /// 現在のフレームを CaptureBuffer にする
    pub fn capture_frame(&self) -> Result<CaptureBuffer> {
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| ScanError::CameraAccess("camera is not active".to_string()))?;
        self.backend.grab_frame(stream)
    }
}

impl<B: CameraBackend> Drop for CameraSession<B> {
    fn drop(&mut self) {
        self.stop();
    }
}
