//! ブラウザのカメラ（MediaDevices / getUserMedia）
//!
//! `CameraBackend` を実装し、取得したストリームを <video> に流す。
//! フレームの取得は canvas に描いて PNG の Data URL 経由で行う。

use js_sys::{Array, Function, Promise, Reflect};
use leptos::html::Video;
use leptos::prelude::*;
use scanner_common::types::{decode_data_url, FRAME_MIME_TYPE};
use scanner_common::{
    CameraBackend, CaptureBuffer, DeviceDescriptor, Facing, Result, ScanError, StreamRequest,
};
use serde::Serialize;
use tracing::{debug, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    CanvasRenderingContext2d, HtmlCanvasElement, HtmlVideoElement, MediaDeviceInfo,
    MediaDeviceKind, MediaDevices, MediaStream, MediaStreamConstraints, MediaStreamTrack,
    MediaTrackConstraints,
};

use crate::describe_js;

// ============================================
// getUserMedia 制約
// ============================================

#[derive(Serialize)]
struct StreamConstraints {
    video: VideoConstraints,
}

#[derive(Serialize)]
#[serde(untagged)]
enum VideoConstraints {
    Device {
        #[serde(rename = "deviceId")]
        device_id: ExactMatch,
    },
    Facing {
        #[serde(rename = "facingMode")]
        facing_mode: &'static str,
    },
}

#[derive(Serialize)]
struct ExactMatch {
    exact: String,
}

#[derive(Serialize)]
struct FocusConstraints {
    advanced: Vec<FocusMode>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FocusMode {
    focus_mode: &'static str,
}

impl From<&StreamRequest> for StreamConstraints {
    fn from(request: &StreamRequest) -> Self {
        let video = match request {
            StreamRequest::Device(id) => VideoConstraints::Device {
                device_id: ExactMatch { exact: id.clone() },
            },
            StreamRequest::Environment => VideoConstraints::Facing {
                facing_mode: "environment",
            },
        };
        Self { video }
    }
}

// ============================================
// ヘルパー
// ============================================

fn camera_error(err: JsValue) -> ScanError {
    ScanError::CameraAccess(describe_js(&err))
}

/// loadedmetadata を待つ上限
const METADATA_TIMEOUT_MS: i32 = 10_000;

/// メタデータ読み込みを待つ
///
/// 要素のエラー・ソースの空化・タイムアウトのいずれかで失敗する。
/// 終了後はハンドラとタイマーを外す。
async fn wait_for_metadata(video: &HtmlVideoElement, timeout_ms: i32) -> Result<()> {
    let window = gloo::utils::window();
    let mut timer = None;
    let loaded = Promise::new(&mut |resolve: Function, reject: Function| {
        let on_loaded = Closure::once_into_js(move || {
            let _ = resolve.call0(&JsValue::NULL);
        });
        video.set_onloadedmetadata(Some(on_loaded.unchecked_ref()));

        let fail = |reason: &'static str| {
            let reject = reject.clone();
            Closure::once_into_js(move || {
                let _ = reject.call1(&JsValue::NULL, &JsValue::from_str(reason));
            })
        };
        video.set_onerror(Some(fail("video element error").unchecked_ref()));
        video.set_onemptied(Some(fail("video source emptied").unchecked_ref()));
        timer = window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                fail("loadedmetadata timed out").unchecked_ref(),
                timeout_ms,
            )
            .ok();
    });
    let outcome = JsFuture::from(loaded).await;

    video.set_onloadedmetadata(None);
    video.set_onerror(None);
    video.set_onemptied(None);
    if let Some(id) = timer {
        window.clear_timeout_with_handle(id);
    }
    outcome.map(|_| ()).map_err(camera_error)
}

fn media_devices() -> Result<MediaDevices> {
    gloo::utils::window()
        .navigator()
        .media_devices()
        .map_err(camera_error)
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| ScanError::CameraAccess(e.to_string()))
}

fn first_video_track(stream: &MediaStream) -> Option<MediaStreamTrack> {
    stream.get_video_tracks().get(0).dyn_into().ok()
}

/// 存在すれば引数なしでメソッドを呼ぶ（未実装のブラウザでは None）
fn call_optional(target: &JsValue, name: &str) -> Option<JsValue> {
    let method: Function = Reflect::get(target, &JsValue::from_str(name))
        .ok()?
        .dyn_into()
        .ok()?;
    method.call0(target).ok()
}

// ============================================
// BrowserCamera
// ============================================

pub struct BrowserCamera {
    video: NodeRef<Video>,
}

impl BrowserCamera {
    pub fn new(video: NodeRef<Video>) -> Self {
        Self { video }
    }

    fn video(&self) -> Result<HtmlVideoElement> {
        // 画面破棄後は NodeRef 自体が破棄済みのことがある
        self.video
            .try_get_untracked()
            .flatten()
            .ok_or_else(|| ScanError::CameraAccess("video element is not mounted".to_string()))
    }
}

impl CameraBackend for BrowserCamera {
    type Stream = MediaStream;

    async fn list_video_inputs(&self) -> Result<Vec<DeviceDescriptor>> {
        let promise = media_devices()?.enumerate_devices().map_err(camera_error)?;
        let list = JsFuture::from(promise).await.map_err(camera_error)?;

        Ok(Array::from(&list)
            .iter()
            .filter_map(|value| value.dyn_into::<MediaDeviceInfo>().ok())
            .filter(|info| info.kind() == MediaDeviceKind::Videoinput)
            .map(|info| DeviceDescriptor::new(info.device_id(), info.label()))
            .collect())
    }

    async fn open(&mut self, request: &StreamRequest) -> Result<MediaStream> {
        let constraints = to_js(&StreamConstraints::from(request))?;
        let promise = media_devices()?
            .get_user_media_with_constraints(constraints.unchecked_ref::<MediaStreamConstraints>())
            .map_err(camera_error)?;
        let stream = JsFuture::from(promise).await.map_err(camera_error)?;
        stream.dyn_into::<MediaStream>().map_err(camera_error)
    }

    async fn attach(&mut self, stream: &MediaStream) -> Result<()> {
        let video = self.video()?;
        video.set_muted(true);
        video.set_attribute("playsinline", "").map_err(camera_error)?;
        video.set_src_object(Some(stream));

        if let Err(e) = wait_for_metadata(&video, METADATA_TIMEOUT_MS).await {
            video.set_src_object(None);
            return Err(e);
        }

        // 自動再生ポリシーによる拒否はログのみ
        if let Ok(playing) = video.play() {
            if let Err(e) = JsFuture::from(playing).await {
                warn!("video.play() rejected: {}", describe_js(&e));
            }
        }
        debug!(
            width = video.video_width(),
            height = video.video_height(),
            "video attached"
        );
        Ok(())
    }

    async fn enable_continuous_focus(&mut self, stream: &MediaStream) -> Result<bool> {
        let Some(track) = first_video_track(stream) else {
            return Ok(false);
        };
        let advertised = call_optional(&track, "getCapabilities")
            .map(|caps| Reflect::has(&caps, &JsValue::from_str("focusMode")).unwrap_or(false))
            .unwrap_or(false);
        if !advertised {
            return Ok(false);
        }

        let constraints = to_js(&FocusConstraints {
            advanced: vec![FocusMode {
                focus_mode: "continuous",
            }],
        })?;
        let promise = track
            .apply_constraints_with_constraints(constraints.unchecked_ref::<MediaTrackConstraints>())
            .map_err(camera_error)?;
        JsFuture::from(promise).await.map_err(camera_error)?;
        Ok(true)
    }

    fn facing(&self, stream: &MediaStream) -> Option<Facing> {
        let track = first_video_track(stream)?;
        let settings = call_optional(&track, "getSettings")?;
        Reflect::get(&settings, &JsValue::from_str("facingMode"))
            .ok()?
            .as_string()
            .and_then(|mode| Facing::from_facing_mode(&mode))
    }

    fn set_mirrored(&mut self, mirrored: bool) {
        let Ok(video) = self.video() else {
            return;
        };
        let transform = if mirrored { "scaleX(-1)" } else { "scaleX(1)" };
        let _ = web_sys::HtmlElement::style(&video).set_property("transform", transform);
    }

    fn grab_frame(&self, _stream: &MediaStream) -> Result<CaptureBuffer> {
        let video = self.video()?;
        let (width, height) = (video.video_width(), video.video_height());
        if width == 0 || height == 0 {
            return Err(ScanError::Image("video has no frame yet".to_string()));
        }

        let canvas: HtmlCanvasElement = gloo::utils::document()
            .create_element("canvas")
            .map_err(camera_error)?
            .dyn_into()
            .map_err(|_| ScanError::Image("canvas is unavailable".to_string()))?;
        canvas.set_width(width);
        canvas.set_height(height);

        let context: CanvasRenderingContext2d = canvas
            .get_context("2d")
            .map_err(camera_error)?
            .ok_or_else(|| ScanError::Image("2d context is unavailable".to_string()))?
            .dyn_into()
            .map_err(|_| ScanError::Image("2d context is unavailable".to_string()))?;
        context
            .draw_image_with_html_video_element_and_dw_and_dh(
                &video,
                0.0,
                0.0,
                width as f64,
                height as f64,
            )
            .map_err(|e| ScanError::Image(describe_js(&e)))?;

        let data_url = canvas
            .to_data_url()
            .map_err(|e| ScanError::Image(describe_js(&e)))?;
        let bytes = decode_data_url(&data_url)?;
        Ok(CaptureBuffer::from_frame(bytes, FRAME_MIME_TYPE, width, height))
    }

    fn release(&mut self, stream: MediaStream) {
        for track in stream.get_tracks().iter() {
            if let Ok(track) = track.dyn_into::<MediaStreamTrack>() {
                track.stop();
            }
        }
    }

    fn detach(&mut self) {
        if let Ok(video) = self.video() {
            video.set_src_object(None);
        }
    }
}
