//! CSVダウンロード
//!
//! 一時的な <a download> を body に挿入してクリックし、すぐに取り除く。

use scanner_common::CsvDownload;
use wasm_bindgen::prelude::*;
use web_sys::HtmlAnchorElement;

pub fn download_csv(csv: &CsvDownload) -> Result<(), JsValue> {
    let link = build_link(csv)?;
    let body = gloo::utils::body();
    body.append_child(&link)?;
    link.click();
    body.remove_child(&link)?;
    Ok(())
}

fn build_link(csv: &CsvDownload) -> Result<HtmlAnchorElement, JsValue> {
    let link: HtmlAnchorElement = gloo::utils::document()
        .create_element("a")?
        .dyn_into()
        .map_err(JsValue::from)?;
    link.set_href(&csv.data_uri());
    link.set_download(&csv.file_name);
    Ok(link)
}
