use crate::utils::AppView;
use dioxus::prelude::*;

#[component]
pub fn Header(
    current_view: ReadSignal<AppView>,
    active_chat: ReadSignal<Option<String>>,
    logged_in_as: ReadSignal<Option<String>>,
    on_navigate: EventHandler<AppView>,
) -> Element {
    let chat_id = active_chat().unwrap_or_else(|| "None".to_string());
    let view = current_view();
    let tabs = [AppView::Chat, AppView::Simulation, AppView::Settings];

    rsx! {
        header {
            class: "sticky top-0 z-30 before:absolute before:inset-0 before:backdrop-blur-md before:bg-[var(--color-base-200)]/90 before:-z-10 after:absolute after:h-px after:inset-x-0 after:top-full after:border-[var(--color-base-300)] after:-z-10",

            div {
                class: "px-4 sm:px-6 lg:px-8",

                div {
                    class: "flex items-center justify-between h-16",

                    // Left side - Title and active chat
                    div {
                        class: "flex items-center gap-4",

                        span {
                            class: "text-xl font-bold text-[var(--color-base-content)]",
                            "Critic Chat"
                        }
                        span {
                            id: "chat-id",
                            class: "text-xs font-mono text-[var(--color-base-content)]/60",
                            "Chat ID: {chat_id}"
                        }
                    }

                    // Right side - Navigation
                    div {
                        class: "flex items-center gap-2",

                        for tab in tabs {
                            {
                                // History views belong to the Chat tab.
                                let active = match (&view, &tab) {
                                    (AppView::History(_), AppView::Chat) => true,
                                    (current, tab) => current == tab,
                                };
                                let target = tab.clone();
                                rsx! {
                                    button {
                                        key: "{tab.name()}",
                                        onclick: move |_| on_navigate.call(target.clone()),
                                        class: "px-3 py-1.5 rounded-lg text-sm font-medium transition-all",
                                        class: if active {
                                            "bg-[var(--color-primary)] text-[var(--color-primary-content)]"
                                        } else {
                                            "bg-[var(--color-base-300)] text-[var(--color-base-content)] hover:bg-[var(--color-base-300)]/80"
                                        },
                                        "{tab.name()}"
                                    }
                                }
                            }
                        }

                        span {
                            class: "ml-2 text-xs text-[var(--color-base-content)]/60",
                            match logged_in_as() {
                                Some(name) => rsx! { "{name}" },
                                None => rsx! { "Guest" },
                            }
                        }
                    }
                }
            }
        }
    }
}
