use super::{BubbleOptions, MessageBubble};
use crate::utils::{ComparisonSide, MessageView, OutputNumber, SectionKey};
use dioxus::prelude::*;

const MESSAGES_CONTAINER_ID: &str = "messages";

/// Scrollable list of visible bubbles; follows the newest entry.
#[component]
pub fn ChatDisplay(
    messages: Vec<MessageView>,
    options: BubbleOptions,
    on_prefer: EventHandler<(String, OutputNumber)>,
    on_toggle_section: EventHandler<(String, SectionKey)>,
    on_choose: EventHandler<(String, ComparisonSide)>,
) -> Element {
    let last_id = messages.last().map(|m| m.id.clone());
    let count = messages.len();

    use_effect(use_reactive!(|(last_id, count)| {
        let _ = (last_id, count);
        document::eval(&format!(
            "const el = document.getElementById('{}'); if (el) {{ el.scrollTop = el.scrollHeight; }}",
            MESSAGES_CONTAINER_ID
        ));
    }));

    rsx! {
        div {
            id: MESSAGES_CONTAINER_ID,
            class: "flex-1 min-h-0 overflow-y-auto",

            div {
                class: "max-w-4xl mx-auto px-4 py-6 space-y-4",

                if messages.is_empty() {
                    div {
                        class: "py-16 text-center text-sm text-[var(--color-base-content)]/60",
                        "Ask the assistant anything to get started."
                    }
                }

                for message in messages {
                    MessageBubble {
                        key: "{message.id}",
                        message,
                        options,
                        on_prefer,
                        on_toggle_section,
                        on_choose,
                    }
                }
            }
        }
    }
}
