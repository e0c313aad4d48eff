//! アップロードフォーム
//!
//! ファイル選択、フィルタ切替、解析・クリアボタン。

use leptos::html::Input;
use leptos::prelude::*;
use scanner_common::ViewSnapshot;
use wasm_bindgen::JsCast;
use web_sys::{File, HtmlInputElement};

fn input_of(ev: &web_sys::Event) -> Option<HtmlInputElement> {
    ev.target()?.dyn_into().ok()
}

#[component]
pub fn UploadForm<FF, FA, FC, FT>(
    snapshot: ReadSignal<ViewSnapshot>,
    file_ref: NodeRef<Input>,
    on_file: FF,
    on_analyze: FA,
    on_clear: FC,
    on_filter: FT,
) -> impl IntoView
where
    FF: Fn(Option<File>) + 'static + Clone,
    FA: Fn(()) + 'static + Clone,
    FC: Fn(()) + 'static + Clone,
    FT: Fn(bool) + 'static + Clone,
{
    let show_analyze = move || snapshot.with(ViewSnapshot::show_analyze);
    let show_clear = move || snapshot.with(|s| s.has_selection || s.status.is_some());

    view! {
        <form
            class="upload-form"
            on:submit={
                let on_analyze = on_analyze.clone();
                move |ev| {
                    ev.prevent_default();
                    on_analyze(())
                }
            }
        >
            <input
                type="file"
                accept="image/*"
                node_ref=file_ref
                on:change={
                    let on_file = on_file.clone();
                    move |ev| {
                        let file = input_of(&ev)
                            .and_then(|input| input.files())
                            .and_then(|files| files.get(0));
                        on_file(file)
                    }
                }
            />

            <label class="filter-toggle">
                <input
                    type="checkbox"
                    prop:checked=move || snapshot.with(|s| s.filter_enabled)
                    on:change={
                        let on_filter = on_filter.clone();
                        move |ev| {
                            let checked = input_of(&ev).map(|input| input.checked()).unwrap_or(false);
                            on_filter(checked)
                        }
                    }
                />
                "Solo datos de factura"
            </label>

            <div class="upload-actions">
                <button
                    type="submit"
                    class="btn btn-primary"
                    style:display=move || if show_analyze() { "inline-block" } else { "none" }
                >
                    "Analizar"
                </button>
                <button
                    type="button"
                    class="btn btn-tertiary"
                    style:display=move || if show_clear() { "inline-block" } else { "none" }
                    on:click={
                        let on_clear = on_clear.clone();
                        move |_| on_clear(())
                    }
                >
                    "Limpiar"
                </button>
            </div>
        </form>
    }
}
