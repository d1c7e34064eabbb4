use super::{ComparisonPanel, ExtraSections, ProcessingIndicator, TypingDots};
use crate::utils::{ComparisonSide, MessageView, OutputNumber, Role, SectionKey, TYPING_PLACEHOLDER};
use dioxus::prelude::*;

/// Which optional parts of a bubble are rendered.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BubbleOptions {
    pub show_score: bool,
    pub show_prefer: bool,
    pub show_sections: bool,
}

#[component]
pub fn MessageBubble(
    message: MessageView,
    options: BubbleOptions,
    on_prefer: EventHandler<(String, OutputNumber)>,
    on_toggle_section: EventHandler<(String, SectionKey)>,
    on_choose: EventHandler<(String, ComparisonSide)>,
) -> Element {
    let is_user = message.role == Role::User;
    let is_system = message.role == Role::System;
    let output_attr = message
        .output
        .map(|o| o.as_u8().to_string())
        .unwrap_or_default();
    let parent_attr = message.parent_id.clone().unwrap_or_default();
    let typing = message.is_dummy && message.text == TYPING_PLACEHOLDER;

    let prefer_target = message
        .parent_id
        .clone()
        .zip(message.output)
        .filter(|_| options.show_prefer && message.is_preferable());
    let dual = prefer_target.is_some();

    rsx! {
        div {
            id: "{message.id}",
            "data-parent-id": "{parent_attr}",
            "data-output-number": "{output_attr}",
            class: "flex w-full",
            class: if is_user { "justify-end" } else if is_system { "justify-center" } else { "justify-start" },

            div {
                class: "relative max-w-[80%] rounded-2xl px-4 py-3 shadow-sm",
                class: if is_user {
                    "bg-[var(--color-primary)] text-[var(--color-primary-content)]"
                } else if is_system {
                    "bg-[var(--color-base-300)] text-[var(--color-base-content)]/80 text-sm"
                } else {
                    "bg-[var(--color-base-200)] text-[var(--color-base-content)] border border-[var(--color-base-300)]"
                },
                class: if message.is_dummy { "opacity-70" } else { "" },

                if let Some(output) = message.output {
                    if dual {
                        div {
                            class: "text-[10px] uppercase font-semibold opacity-60 mb-1",
                            "Response {output.as_u8()}"
                        }
                    }
                }

                if let Some(comparison) = message.comparison.clone() {
                    ComparisonPanel {
                        message_id: message.id.clone(),
                        comparison,
                        on_choose,
                    }
                }

                if typing {
                    TypingDots {}
                } else {
                    p {
                        class: "whitespace-pre-wrap break-words text-sm sm:text-base",
                        "{message.text}"
                    }
                }

                ProcessingIndicator { overlay: message.overlay.clone() }

                if options.show_sections && !message.sections.is_empty() {
                    ExtraSections {
                        message_id: message.id.clone(),
                        sections: message.sections.clone(),
                        on_toggle: on_toggle_section,
                    }
                }

                div {
                    class: "flex items-center justify-end gap-2 mt-2 empty:hidden",

                    if let Some((parent_id, output)) = prefer_target {
                        button {
                            onclick: move |_| on_prefer.call((parent_id.clone(), output)),
                            class: "px-2.5 py-1 rounded-md text-xs font-medium bg-[var(--color-base-300)] hover:bg-[var(--color-primary)] hover:text-[var(--color-primary-content)] transition-colors",
                            "Prefer this response"
                        }
                    }

                    if options.show_score {
                        if let Some(badge) = message.score.clone() {
                            span {
                                class: "px-2 py-0.5 rounded-full text-xs font-semibold text-white {badge.tone.css_class()}",
                                title: if badge.is_regenerated() { "Score after regeneration" } else { "Critic score" },
                                "{badge.label()}"
                            }
                        }
                    }
                }
            }
        }
    }
}
