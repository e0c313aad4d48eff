//! 結果パネル
//!
//! 状態メッセージ、編集可能な結果テキスト、CSVダウンロード。

use leptos::prelude::*;
use scanner_common::ViewSnapshot;
use wasm_bindgen::JsCast;
use web_sys::HtmlTextAreaElement;

#[component]
pub fn ResultPanel<FE, FD>(
    snapshot: ReadSignal<ViewSnapshot>,
    on_edit: FE,
    on_download: FD,
) -> impl IntoView
where
    FE: Fn(String) + 'static + Clone,
    FD: Fn(()) + 'static + Clone,
{
    view! {
        <div class="result-panel">
            <div
                class="result"
                style:display=move || if snapshot.with(|s| s.status.is_some()) { "block" } else { "none" }
            >
                {move || snapshot.with(|s| s.status.clone().unwrap_or_default())}
            </div>

            <div
                class="invoice-preview"
                style:display=move || if snapshot.with(|s| s.result_visible) { "block" } else { "none" }
            >
                <textarea
                    class="editable-data"
                    rows="12"
                    prop:value=move || snapshot.with(|s| s.editable.clone())
                    on:input={
                        let on_edit = on_edit.clone();
                        move |ev| {
                            let text = ev
                                .target()
                                .and_then(|t| t.dyn_into::<HtmlTextAreaElement>().ok())
                                .map(|area| area.value())
                                .unwrap_or_default();
                            on_edit(text)
                        }
                    }
                ></textarea>
                <button
                    class="btn btn-secondary"
                    disabled=move || !snapshot.with(|s| s.csv_enabled)
                    on:click={
                        let on_download = on_download.clone();
                        move |_| on_download(())
                    }
                >
                    "Descargar CSV"
                </button>
            </div>
        </div>
    }
}
