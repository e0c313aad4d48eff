//! Invoice Scanner Web App (Leptos + WASM)

mod app;
mod components;
mod api;
mod camera;
mod export;
mod file_io;
mod logging;

use wasm_bindgen::prelude::*;

#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    logging::init();
    leptos::mount::mount_to_body(app::App);
}

/// JS 例外を表示用の文字列にする
pub(crate) fn describe_js(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}
