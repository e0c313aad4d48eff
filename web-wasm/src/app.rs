//! メインアプリケーションコンポーネント
//!
//! 取得ステートマシンを1つだけ持ち、各操作の後に ViewSnapshot を更新して描画する。
//! OCR通信中はマシンのロックを手放すので、その間もクリアやカメラ操作ができる。

use std::rc::Rc;

use futures::lock::Mutex;
use leptos::html::{Input, Video};
use leptos::prelude::*;
use leptos::task::spawn_local;
use scanner_common::{
    submit, AcquisitionMachine, ProcessingMode, ScanError, ScannerConfig, SubmissionTicket,
    Surface, ViewSnapshot,
};
use tracing::{debug, info, warn};
use web_sys::File;

use crate::api::ocr::FetchTransport;
use crate::camera::BrowserCamera;
use crate::components::{
    camera_panel::CameraPanel, header::Header, result_panel::ResultPanel,
    upload_form::UploadForm,
};
use crate::export::csv_download::download_csv;
use crate::file_io::read_file;

type WebMachine = AcquisitionMachine<BrowserCamera>;
type SharedMachine = Rc<Mutex<WebMachine>>;

fn viewport_width() -> u32 {
    gloo::utils::window()
        .inner_width()
        .ok()
        .and_then(|w| w.as_f64())
        .unwrap_or(0.0) as u32
}

fn refresh(machine: &WebMachine, set_snapshot: WriteSignal<ViewSnapshot>) {
    set_snapshot.set(machine.snapshot(viewport_width()));
}

/// ダイアログ対象のエラーだけ alert を出す（それ以外は結果欄に出ている）
fn report(err: &ScanError) {
    warn!("{}", err);
    if err.surface() == Surface::Alert {
        gloo::dialogs::alert(&err.to_string());
    }
}

/// ロック外で通信し、結果をマシンに戻す
async fn drive_submission(
    machine: SharedMachine,
    transport: FetchTransport,
    ticket: SubmissionTicket,
    set_snapshot: WriteSignal<ViewSnapshot>,
) {
    let seq = ticket.seq;
    let result = submit(&transport, &ticket.request).await;
    let mut guard = machine.lock().await;
    if !guard.complete_submission(seq, result) {
        info!(seq, "result dropped");
    }
    refresh(&guard, set_snapshot);
}

#[component]
pub fn App() -> impl IntoView {
    let config = ScannerConfig::default();
    let video_ref = NodeRef::<Video>::new();
    let file_ref = NodeRef::<Input>::new();

    let transport = StoredValue::new(FetchTransport::new(config.endpoint.clone()));
    let machine = StoredValue::new_local(Rc::new(Mutex::new(AcquisitionMachine::new(
        BrowserCamera::new(video_ref),
        config,
    ))));
    let (snapshot, set_snapshot) = signal(ViewSnapshot::default());

    // 通信を伴う操作（解析・撮影承認）の共通部分
    let submit_with = move |start: fn(&mut WebMachine) -> scanner_common::Result<SubmissionTicket>| {
        let machine = machine.get_value();
        let transport = transport.get_value();
        spawn_local(async move {
            let ticket = {
                let mut guard = machine.lock().await;
                let ticket = start(&mut guard);
                refresh(&guard, set_snapshot);
                ticket
            };
            match ticket {
                Ok(ticket) => drive_submission(machine, transport, ticket, set_snapshot).await,
                Err(e) => report(&e),
            }
        });
    };

    // ファイル選択
    let on_file = move |file: Option<File>| {
        let machine = machine.get_value();
        spawn_local(async move {
            let buffer = match file {
                Some(file) => match read_file(&file).await {
                    Ok(buffer) => Some(buffer),
                    Err(e) => {
                        warn!("{}", e);
                        gloo::dialogs::alert(&e.to_string());
                        None
                    }
                },
                None => None,
            };
            let mut guard = machine.lock().await;
            guard.select_file(buffer);
            refresh(&guard, set_snapshot);
        });
    };

    let on_analyze = move |_| submit_with(WebMachine::analyze);

    let on_clear = move |_| {
        if let Some(input) = file_ref.get_untracked() {
            input.set_value("");
        }
        let machine = machine.get_value();
        spawn_local(async move {
            let mut guard = machine.lock().await;
            guard.clear();
            refresh(&guard, set_snapshot);
        });
    };

    let on_filter = move |enabled: bool| {
        let machine = machine.get_value();
        spawn_local(async move {
            let mut guard = machine.lock().await;
            guard.set_mode(if enabled {
                ProcessingMode::filtered()
            } else {
                ProcessingMode::full_text()
            });
            refresh(&guard, set_snapshot);
        });
    };

    // カメラ
    let on_toggle = move |_| {
        let machine = machine.get_value();
        spawn_local(async move {
            // カメラ操作中の連打は捨てる
            let Some(mut guard) = machine.try_lock() else {
                debug!("camera busy, toggle_camera ignored");
                return;
            };
            if let Err(e) = guard.toggle_camera().await {
                report(&e);
            }
            refresh(&guard, set_snapshot);
        });
    };

    let on_switch = move |_| {
        let machine = machine.get_value();
        spawn_local(async move {
            // カメラ操作中の連打は捨てる
            let Some(mut guard) = machine.try_lock() else {
                debug!("camera busy, switch_camera ignored");
                return;
            };
            if let Err(e) = guard.switch_camera().await {
                report(&e);
            }
            refresh(&guard, set_snapshot);
        });
    };

    let on_capture = move |_| {
        let machine = machine.get_value();
        spawn_local(async move {
            let mut guard = machine.lock().await;
            if let Err(e) = guard.capture() {
                report(&e);
            }
            refresh(&guard, set_snapshot);
        });
    };

    let on_accept = move |_| submit_with(WebMachine::accept_capture);

    let on_cancel = move |_| {
        let machine = machine.get_value();
        spawn_local(async move {
            let mut guard = machine.lock().await;
            guard.cancel_capture();
            refresh(&guard, set_snapshot);
        });
    };

    // 結果
    let on_edit = move |text: String| {
        let machine = machine.get_value();
        spawn_local(async move {
            machine.lock().await.set_editable(text);
        });
    };

    let on_download = move |_| {
        let machine = machine.get_value();
        spawn_local(async move {
            let guard = machine.lock().await;
            if let Some(csv) = guard.export_csv() {
                if let Err(e) = download_csv(&csv) {
                    warn!("CSV download failed: {:?}", e);
                }
            }
        });
    };

    // 画面破棄時にストリームを解放する
    on_cleanup(move || {
        machine.try_with_value(|m| {
            if let Some(mut guard) = m.try_lock() {
                guard.stop_camera();
            }
        });
    });

    view! {
        <div class="container">
            <Header />

            <UploadForm
                snapshot=snapshot
                file_ref=file_ref
                on_file=on_file
                on_analyze=on_analyze
                on_clear=on_clear
                on_filter=on_filter
            />

            <CameraPanel
                snapshot=snapshot
                video_ref=video_ref
                on_toggle=on_toggle
                on_switch=on_switch
                on_capture=on_capture
                on_accept=on_accept
                on_cancel=on_cancel
            />

            <Show when=move || snapshot.with(|s| s.thumbnail.is_some())>
                <img
                    class="image-preview show"
                    alt="Vista previa"
                    src=move || snapshot.with(|s| s.thumbnail.clone().unwrap_or_default())
                />
            </Show>

            <ResultPanel
                snapshot=snapshot
                on_edit=on_edit
                on_download=on_download
            />
        </div>
    }
}
