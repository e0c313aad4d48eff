//! ヘッダーコンポーネント

use leptos::prelude::*;

#[component]
pub fn Header() -> impl IntoView {
    view! {
        <header class="header">
            <h1>"Escáner de Facturas"</h1>
            <p class="text-muted">"Sube una foto o usa la cámara para extraer el texto"</p>
        </header>
    }
}
