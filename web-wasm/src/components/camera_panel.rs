//! カメラパネル
//!
//! <video> は常にマウントしておき、表示だけを切り替える（NodeRef をカメラ側が掴むため）。

use leptos::html::Video;
use leptos::prelude::*;
use scanner_common::{SessionState, ViewSnapshot};

#[component]
pub fn CameraPanel<FT, FS, FC, FA, FX>(
    snapshot: ReadSignal<ViewSnapshot>,
    video_ref: NodeRef<Video>,
    on_toggle: FT,
    on_switch: FS,
    on_capture: FC,
    on_accept: FA,
    on_cancel: FX,
) -> impl IntoView
where
    FT: Fn(()) + 'static + Clone,
    FS: Fn(()) + 'static + Clone + Send + Sync,
    FC: Fn(()) + 'static + Clone,
    FA: Fn(()) + 'static + Clone + Send + Sync,
    FX: Fn(()) + 'static + Clone + Send + Sync,
{
    let camera_active = move || snapshot.with(|s| s.camera_active);
    let live = move || snapshot.with(|s| s.state == SessionState::CameraActive);

    view! {
        <div class="camera-panel">
            <div class="camera-controls">
                <button
                    class="btn btn-secondary"
                    on:click={
                        let on_toggle = on_toggle.clone();
                        move |_| on_toggle(())
                    }
                >
                    {move || if camera_active() { "Desactivar Cámara" } else { "Activar Cámara" }}
                </button>

                <Show when=move || snapshot.with(|s| s.show_switch)>
                    <button
                        class="btn btn-secondary"
                        on:click={
                            let on_switch = on_switch.clone();
                            move |_| on_switch(())
                        }
                    >
                        "Cambiar Cámara"
                    </button>
                </Show>
            </div>

            <div
                class="canvas-container"
                style:display=move || if live() { "block" } else { "none" }
            >
                <video node_ref=video_ref class="video"></video>
                <button
                    class="btn btn-primary"
                    on:click={
                        let on_capture = on_capture.clone();
                        move |_| on_capture(())
                    }
                >
                    "Capturar"
                </button>
            </div>

            <Show when=move || snapshot.with(|s| s.capture_preview.is_some())>
                <div class="capture-options">
                    <img
                        class="captured-image"
                        alt="Captura"
                        src=move || snapshot.with(|s| s.capture_preview.clone().unwrap_or_default())
                    />
                    <button
                        class="btn btn-primary"
                        on:click={
                            let on_accept = on_accept.clone();
                            move |_| on_accept(())
                        }
                    >
                        "Aceptar"
                    </button>
                    <button
                        class="btn btn-tertiary"
                        on:click={
                            let on_cancel = on_cancel.clone();
                            move |_| on_cancel(())
                        }
                    >
                        "Cancelar"
                    </button>
                </div>
            </Show>
        </div>
    }
}
