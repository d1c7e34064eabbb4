use crate::utils::ProcessingOverlay;
use dioxus::prelude::*;

#[component]
pub fn TypingDots() -> Element {
    rsx! {
        div {
            class: "flex items-center gap-1",
            div {
                class: "w-2 h-2 bg-[var(--color-primary)] rounded-full animate-pulse"
            }
            div {
                class: "w-2 h-2 bg-[var(--color-primary)] rounded-full animate-pulse"
            }
            div {
                class: "w-2 h-2 bg-[var(--color-primary)] rounded-full animate-pulse"
            }
        }
    }
}

/// Step label and progress bar shown over a bubble while the server works on it.
#[component]
pub fn ProcessingIndicator(overlay: Option<ProcessingOverlay>) -> Element {
    let Some(overlay) = overlay else {
        return rsx! { Fragment {} };
    };
    let percent = overlay.percent();

    rsx! {
        div {
            class: "mt-2 space-y-1",

            div {
                class: "flex items-center gap-2 text-xs text-[var(--color-base-content)]/70",
                TypingDots {}
                span { "{overlay.label()}" }
            }

            if overlay.progress.is_some() {
                div {
                    class: "h-1 w-full rounded-full bg-[var(--color-base-300)] overflow-hidden",
                    div {
                        class: "h-full bg-[var(--color-primary)] transition-all duration-300",
                        style: "width: {percent}%",
                    }
                }
            }
        }
    }
}
