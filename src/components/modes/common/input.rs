use dioxus::prelude::*;

#[component]
pub fn ChatInput(disabled: bool, on_send: EventHandler<String>) -> Element {
    let mut input_text = use_signal(String::new);

    // Clears the box and hands the text over, unless there is nothing to send.
    let mut send = move || {
        let text = input_text.peek().trim().to_string();
        if text.is_empty() || disabled {
            return false;
        }
        input_text.set(String::new());
        on_send.call(text);
        true
    };

    let handle_keydown = move |evt: KeyboardEvent| {
        if evt.key() != Key::Enter || evt.modifiers().contains(Modifiers::SHIFT) {
            return;
        }
        if send() {
            evt.prevent_default();
        }
    };

    let can_send = !input_text.read().trim().is_empty() && !disabled;

    rsx! {
        div {
            class: "relative w-full bg-[var(--color-base-200)] border-[var(--color-base-300)] border-t shadow-lg",

            div {
                class: "max-w-6xl mx-auto px-3 sm:px-4 md:px-6 py-3",

                div {
                    class: "relative",

                    textarea {
                        value: "{input_text}",
                        oninput: move |evt| input_text.set(evt.value().clone()),
                        onkeydown: handle_keydown,
                        placeholder: "Type your message... (Enter to send)",
                        class: "w-full px-4 pr-16 py-3 rounded-xl bg-[var(--color-base-100)] text-[var(--color-base-content)] border-[var(--color-base-300)] border-2 focus:outline-none focus:ring-2 focus:ring-[var(--color-primary)] focus:border-transparent transition-all duration-200 text-sm sm:text-base shadow-sm resize-none h-16 sm:h-20",
                        autofocus: true,
                    }

                    button {
                        onclick: move |_| {
                            send();
                        },
                        disabled: !can_send,
                        class: "absolute right-3 bottom-3 p-2 rounded-lg transition-all duration-200 text-sm font-medium disabled:opacity-50 disabled:cursor-not-allowed",
                        class: if can_send {
                            "bg-[var(--color-primary)] text-[var(--color-primary-content)] hover:bg-[var(--color-primary)]/90 shadow-sm hover:shadow-md"
                        } else {
                            "bg-[var(--color-base-300)] text-[var(--color-base-content)]/50"
                        },
                        span { "➤" }
                    }
                }

                div {
                    class: "text-xs text-[var(--color-base-content)]/70 mt-1 px-1 text-center",
                    if disabled {
                        "Waiting for the assistant..."
                    } else {
                        "Use Enter to send, Shift+Enter for new line"
                    }
                }
            }
        }
    }
}
