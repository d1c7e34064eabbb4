use crate::utils::{
    toggle_label, ComparisonSide, CriticView, RegenerationComparison, Section, SectionBody,
    SectionKey,
};
use dioxus::prelude::*;

#[component]
pub fn CriticTable(view: CriticView) -> Element {
    match view {
        CriticView::Unavailable => rsx! {
            p {
                class: "text-xs italic text-[var(--color-base-content)]/60",
                "{CriticView::placeholder_text()}"
            }
        },
        CriticView::Scored {
            total,
            summary,
            categories,
        } => rsx! {
            div {
                class: "space-y-2 text-xs",

                div {
                    class: "font-semibold text-[var(--color-base-content)]",
                    "Total Score: {total}"
                }

                if let Some(summary) = summary {
                    p {
                        class: "text-[var(--color-base-content)]/80",
                        "{summary}"
                    }
                }

                if !categories.is_empty() {
                    table {
                        class: "w-full border-collapse",
                        tbody {
                            for (label, score) in categories {
                                tr {
                                    key: "{label}",
                                    class: "border-t border-[var(--color-base-300)]",
                                    td { class: "py-1 pr-2 text-[var(--color-base-content)]/70", "{label}" }
                                    td { class: "py-1 text-right font-medium", "{score}" }
                                }
                            }
                        }
                    }
                }
            }
        },
    }
}

/// Collapsible extra-data panels under an assistant bubble, in section order.
#[component]
pub fn ExtraSections(
    message_id: String,
    sections: Vec<Section>,
    on_toggle: EventHandler<(String, SectionKey)>,
) -> Element {
    rsx! {
        div {
            class: "mt-2 space-y-1",

            for section in sections {
                {
                    let key = section.key;
                    let id = message_id.clone();
                    rsx! {
                        div {
                            key: "{message_id}-{key.id()}",
                            "data-section": key.id(),
                            class: "rounded-lg border border-[var(--color-base-300)] bg-[var(--color-base-100)]/60",

                            button {
                                onclick: move |_| on_toggle.call((id.clone(), key)),
                                class: "w-full text-left px-3 py-1.5 text-xs font-medium text-[var(--color-primary)] hover:bg-[var(--color-base-300)]/50 rounded-lg transition-colors",
                                "{toggle_label(section.expanded, section.title())}"
                            }

                            if section.expanded {
                                div {
                                    class: "px-3 pb-2",
                                    match section.body {
                                        SectionBody::Text(text) => rsx! {
                                            pre {
                                                class: "whitespace-pre-wrap break-words text-xs text-[var(--color-base-content)]/80 font-mono",
                                                "{text}"
                                            }
                                        },
                                        SectionBody::Critic(view) => rsx! {
                                            CriticTable { view }
                                        },
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Original vs improved reply, with a choice of which one the bubble shows.
#[component]
pub fn ComparisonPanel(
    message_id: String,
    comparison: RegenerationComparison,
    on_choose: EventHandler<(String, ComparisonSide)>,
) -> Element {
    let columns = [
        (
            ComparisonSide::Original,
            "Original Response",
            comparison.original.clone(),
            comparison.original_critic.clone(),
        ),
        (
            ComparisonSide::Improved,
            "Improved Response",
            comparison.improved.clone(),
            comparison.improved_critic.clone(),
        ),
    ];

    rsx! {
        div {
            class: "mb-3 grid grid-cols-2 gap-3",

            for (side, title, text, critic) in columns {
                {
                    let selected = comparison.selected == side;
                    let id = message_id.clone();
                    rsx! {
                        div {
                            key: "{title}",
                            class: "rounded-lg p-3 border bg-[var(--color-base-100)]",
                            class: if selected {
                                "border-[var(--color-primary)]"
                            } else {
                                "border-[var(--color-base-300)]"
                            },

                            h4 {
                                class: "text-xs font-semibold uppercase text-[var(--color-base-content)]/60 mb-2",
                                "{title}"
                            }
                            p {
                                class: "text-sm whitespace-pre-wrap break-words mb-2",
                                "{text}"
                            }
                            if let Some(view) = critic {
                                div {
                                    class: "mb-2",
                                    CriticTable { view }
                                }
                            }
                            button {
                                onclick: move |_| on_choose.call((id.clone(), side)),
                                disabled: selected,
                                class: "px-2.5 py-1 rounded-md text-xs font-medium transition-colors disabled:cursor-default",
                                class: if selected {
                                    "bg-[var(--color-primary)] text-[var(--color-primary-content)]"
                                } else {
                                    "bg-[var(--color-base-300)] hover:bg-[var(--color-base-300)]/80"
                                },
                                if selected { "Selected" } else { "Use this response" }
                            }
                        }
                    }
                }
            }
        }
    }
}
