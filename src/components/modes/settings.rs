use crate::utils::{Credentials, Settings as AppSettings};
use dioxus::prelude::*;

const SECTION_CLASS: &str =
    "bg-[var(--color-base-200)] rounded-lg p-6 border border-[var(--color-base-300)]";
const FIELD_CLASS: &str = "w-full px-3 py-2 rounded-lg bg-[var(--color-base-100)] text-[var(--color-base-content)] border border-[var(--color-base-300)] focus:outline-none focus:ring-2 focus:ring-[var(--color-primary)] text-sm";

#[component]
pub fn Settings(
    settings: Signal<AppSettings>,
    logged_in_as: ReadSignal<Option<String>>,
    on_save: EventHandler<AppSettings>,
    on_login: EventHandler<Credentials>,
    on_logout: EventHandler<()>,
    on_close: EventHandler<()>,
) -> Element {
    let initial = settings.peek().clone();
    let initial_credentials = initial.credentials.clone().unwrap_or_default();

    let mut base_url = use_signal(|| initial.server.base_url.clone());
    let mut timeout = use_signal(|| initial.server.request_timeout_secs.to_string());
    let mut username = use_signal(|| initial_credentials.username.clone());
    let mut password = use_signal(|| initial_credentials.password.clone());
    let mut remember = use_signal(|| initial.has_credentials());
    let mut features = use_signal(|| initial.features.clone());

    let save = move |_| {
        let mut next = settings.peek().clone();
        next.server.base_url = base_url.read().trim().to_string();
        if let Ok(secs) = timeout.read().trim().parse::<u64>() {
            next.server.request_timeout_secs = secs.max(1);
        }
        if remember() && !username.read().trim().is_empty() {
            next.set_credentials(username.read().trim().to_string(), password());
        } else {
            next.clear_credentials();
        }
        next.features = features();
        on_save.call(next);
    };

    let login = move |_| {
        on_login.call(Credentials {
            username: username.read().trim().to_string(),
            password: password(),
        });
    };

    let flags = features();

    rsx! {
        div {
            class: "flex flex-col h-full overflow-y-auto",

            div {
                class: "max-w-2xl mx-auto w-full p-6",

                // Header
                div {
                    class: "flex items-center justify-between mb-8",
                    h1 {
                        class: "text-3xl font-bold text-[var(--color-base-content)]",
                        "Settings"
                    }
                    button {
                        onclick: move |_| on_close.call(()),
                        class: "p-2 hover:bg-[var(--color-base-300)] rounded-lg transition-colors text-xl leading-none",
                        title: "Close settings",
                        "✕"
                    }
                }

                div {
                    class: "space-y-6",

                    // Server
                    div {
                        class: SECTION_CLASS,

                        h2 {
                            class: "text-xl font-semibold text-[var(--color-base-content)] mb-4",
                            "Server"
                        }

                        div {
                            class: "space-y-4",
                            label {
                                class: "block text-sm font-medium mb-1",
                                "Base URL"
                                input {
                                    r#type: "text",
                                    value: "{base_url}",
                                    oninput: move |evt| base_url.set(evt.value()),
                                    class: FIELD_CLASS,
                                }
                            }
                            label {
                                class: "block text-sm font-medium mb-1",
                                "Request timeout (seconds)"
                                input {
                                    r#type: "number",
                                    min: "1",
                                    value: "{timeout}",
                                    oninput: move |evt| timeout.set(evt.value()),
                                    class: FIELD_CLASS,
                                }
                            }
                        }
                    }

                    // Account
                    div {
                        class: SECTION_CLASS,

                        div {
                            class: "flex items-center justify-between mb-4",
                            h2 {
                                class: "text-xl font-semibold text-[var(--color-base-content)]",
                                "Account"
                            }
                            span {
                                class: "text-xs text-[var(--color-base-content)]/70",
                                match logged_in_as() {
                                    Some(name) => rsx! { "Logged in as {name}" },
                                    None => rsx! { "Not logged in" },
                                }
                            }
                        }

                        div {
                            class: "space-y-4",
                            label {
                                class: "block text-sm font-medium mb-1",
                                "Username"
                                input {
                                    r#type: "text",
                                    value: "{username}",
                                    oninput: move |evt| username.set(evt.value()),
                                    class: FIELD_CLASS,
                                }
                            }
                            label {
                                class: "block text-sm font-medium mb-1",
                                "Password"
                                input {
                                    r#type: "password",
                                    value: "{password}",
                                    oninput: move |evt| password.set(evt.value()),
                                    class: FIELD_CLASS,
                                }
                            }
                            label {
                                class: "flex items-center gap-2 text-sm cursor-pointer",
                                input {
                                    r#type: "checkbox",
                                    checked: remember(),
                                    onchange: move |evt| remember.set(evt.checked()),
                                    class: "w-4 h-4 accent-[var(--color-primary)]",
                                }
                                "Remember credentials and log in on startup"
                            }

                            div {
                                class: "flex gap-2",
                                button {
                                    onclick: login,
                                    disabled: username.read().trim().is_empty(),
                                    class: "px-4 py-2 rounded-lg bg-[var(--color-primary)] text-[var(--color-primary-content)] text-sm font-medium hover:bg-[var(--color-primary)]/90 disabled:opacity-50 transition-all",
                                    "Log in"
                                }
                                if logged_in_as().is_some() {
                                    button {
                                        onclick: move |_| on_logout.call(()),
                                        class: "px-4 py-2 rounded-lg bg-[var(--color-base-300)] text-[var(--color-base-content)] text-sm font-medium hover:bg-[var(--color-base-300)]/80 transition-all",
                                        "Log out"
                                    }
                                }
                            }
                        }
                    }

                    // Display
                    div {
                        class: SECTION_CLASS,

                        h2 {
                            class: "text-xl font-semibold text-[var(--color-base-content)] mb-4",
                            "Display"
                        }

                        div {
                            class: "space-y-4",
                            FeatureToggle {
                                label: "Critic scores",
                                description: "Show score badges and keep them in sync with the server",
                                checked: flags.critic_display,
                                on_change: move |on| features.write().critic_display = on,
                            }
                            FeatureToggle {
                                label: "Dual output",
                                description: "Offer the second assistant and the \"Prefer this response\" control",
                                checked: flags.dual_output,
                                on_change: move |on| features.write().dual_output = on,
                            }
                            FeatureToggle {
                                label: "Extra sections",
                                description: "Show extracted preferences, search data, reasoning and critic details",
                                checked: flags.extra_sections,
                                on_change: move |on| features.write().extra_sections = on,
                            }
                        }
                    }

                    div {
                        class: "flex justify-end",
                        button {
                            onclick: save,
                            class: "px-5 py-2 rounded-lg bg-[var(--color-primary)] text-[var(--color-primary-content)] text-sm font-medium hover:bg-[var(--color-primary)]/90 transition-all",
                            "Save"
                        }
                    }
                }
            }
        }
    }
}

#[component]
fn FeatureToggle(
    label: &'static str,
    description: &'static str,
    checked: bool,
    on_change: EventHandler<bool>,
) -> Element {
    rsx! {
        label {
            class: "flex items-start gap-3 cursor-pointer",
            input {
                r#type: "checkbox",
                checked,
                onchange: move |evt| on_change.call(evt.checked()),
                class: "mt-1 w-4 h-4 accent-[var(--color-primary)]"
            }
            div {
                div { class: "font-medium text-[var(--color-base-content)]", "{label}" }
                div { class: "text-sm text-[var(--color-base-content)]/70 mt-1", "{description}" }
            }
        }
    }
}
