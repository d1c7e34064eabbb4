use crate::utils::{FlashKind, FlashQueue, FLASH_DURATION};
use dioxus::prelude::*;

/// Queues a notification and schedules its removal.
pub fn flash(mut flashes: Signal<FlashQueue>, kind: FlashKind, text: impl Into<String>) {
    let id = flashes.write().push(kind, text);
    spawn(async move {
        tokio::time::sleep(FLASH_DURATION).await;
        flashes.write().dismiss(id);
    });
}

#[component]
pub fn FlashStack(flashes: Signal<FlashQueue>) -> Element {
    rsx! {
        div {
            class: "fixed top-20 right-4 z-50 flex flex-col gap-2 pointer-events-none",

            for message in flashes.read().messages().iter().cloned() {
                div {
                    key: "{message.id}",
                    class: "pointer-events-auto min-w-64 max-w-sm px-4 py-2.5 rounded-lg shadow-lg text-sm text-white flex items-start justify-between gap-3 {message.kind.css_class()}",
                    span { "{message.text}" }
                    button {
                        onclick: move |_| flashes.write().dismiss(message.id),
                        class: "opacity-70 hover:opacity-100",
                        "✕"
                    }
                }
            }
        }
    }
}
