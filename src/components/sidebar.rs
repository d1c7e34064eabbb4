use crate::utils::{format_relative, now_secs, RecentChat};
use dioxus::prelude::*;

#[component]
pub fn Sidebar(
    chats: Signal<Vec<RecentChat>>,
    active_chat: ReadSignal<Option<String>>,
    collapsed: Signal<bool>,
    on_new_chat: EventHandler<()>,
    on_select_chat: EventHandler<String>,
    on_forget_chat: EventHandler<String>,
) -> Element {
    let is_collapsed = *collapsed.read();
    let now = now_secs();

    let toggle_collapse = move |_| {
        let current = *collapsed.read();
        collapsed.set(!current);
    };

    rsx! {
        div {
            class: "shrink-0 bg-[var(--color-base-200)] border-r border-[var(--color-base-300)] flex flex-col h-screen transition-all duration-300",
            class: if is_collapsed { "w-20" } else { "w-64" },

            div {
                class: "flex-1 overflow-y-auto p-4 flex flex-col",

                // New Chat button
                div {
                    class: "mb-4",
                    button {
                        onclick: move |_| on_new_chat.call(()),
                        class: "w-full flex items-center justify-center bg-[var(--color-primary)] hover:bg-[var(--color-primary)]/90 text-[var(--color-primary-content)] rounded-lg font-medium text-sm transition-all duration-200 shadow-sm",
                        class: if is_collapsed { "p-2.5" } else { "gap-1.5 px-3 py-2" },
                        title: if is_collapsed { "New Chat" } else { "" },

                        span { "+" }
                        if !is_collapsed {
                            span { "New Chat" }
                        }
                    }
                }

                // Recent chats
                div {
                    class: "flex-1 overflow-y-auto",

                    if !is_collapsed {
                        h3 {
                            class: "text-xs uppercase text-[var(--color-base-content)]/60 font-semibold px-3 mb-3",
                            "Recent Chats"
                        }
                    }

                    div {
                        class: "space-y-1",

                        if chats.read().is_empty() {
                            if !is_collapsed {
                                div {
                                    class: "px-3 py-6 text-center",
                                    p {
                                        class: "text-xs text-[var(--color-base-content)]/60",
                                        "No conversations yet"
                                    }
                                }
                            }
                        } else {
                            for chat in chats.read().iter().cloned() {
                                {
                                    let is_active = active_chat().as_deref() == Some(chat.chat_id.as_str());
                                    let select_id = chat.chat_id.clone();
                                    let forget_id = chat.chat_id.clone();
                                    let initial = chat.title.chars().next().unwrap_or('#').to_uppercase().to_string();

                                    rsx! {
                                        div {
                                            key: "{chat.chat_id}",
                                            class: "group relative w-full rounded-lg transition-all duration-200",
                                            class: if is_active {
                                                "bg-[var(--color-primary)]/10 border border-[var(--color-primary)]"
                                            } else {
                                                "hover:bg-[var(--color-base-300)]/50"
                                            },

                                            button {
                                                onclick: move |_| on_select_chat.call(select_id.clone()),
                                                class: "w-full",
                                                class: if is_collapsed {
                                                    "p-2 flex items-center justify-center"
                                                } else {
                                                    "text-left px-2.5 py-2 pr-7"
                                                },
                                                title: "{chat.title}",

                                                if is_collapsed {
                                                    span {
                                                        class: "text-xs font-semibold",
                                                        "{initial}"
                                                    }
                                                } else {
                                                    div {
                                                        class: "min-w-0",
                                                        div {
                                                            class: "text-xs font-medium text-[var(--color-base-content)] truncate",
                                                            "{chat.title}"
                                                        }
                                                        div {
                                                            class: "text-[10px] text-[var(--color-base-content)]/50 mt-0.5",
                                                            "{format_relative(chat.timestamp, now)}"
                                                        }
                                                    }
                                                }
                                            }

                                            if !is_collapsed {
                                                button {
                                                    onclick: move |_| on_forget_chat.call(forget_id.clone()),
                                                    class: "absolute right-1.5 top-1.5 opacity-0 group-hover:opacity-60 hover:opacity-100 text-xs",
                                                    title: "Remove from recent chats",
                                                    "✕"
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

            // Collapse/Expand button at the bottom
            div {
                class: "p-4 border-t border-[var(--color-base-300)]",
                button {
                    onclick: toggle_collapse,
                    class: "w-full flex items-center justify-center bg-[var(--color-base-300)] hover:bg-[var(--color-base-300)]/80 text-[var(--color-base-content)] rounded-lg transition-all duration-200",
                    class: if is_collapsed { "p-2.5" } else { "gap-2 px-3 py-2" },
                    title: if is_collapsed { "Expand sidebar" } else { "Collapse sidebar" },

                    if is_collapsed {
                        span { "»" }
                    } else {
                        span { "«" }
                        span {
                            class: "text-sm font-medium",
                            "Collapse"
                        }
                    }
                }
            }
        }
    }
}
