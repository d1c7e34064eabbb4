use dioxus::prelude::*;

mod components;
mod utils;

use components::{
    flash, Chat, FlashStack, Header, Settings as SettingsView, Sidebar, Simulation,
};
use tracing::{error, info, warn};
use utils::{
    AppView, AssistantClient, ChatHistory, ChatSession, Credentials, FlashKind, FlashQueue,
    RecentChat, Settings,
};

const TAILWIND_CSS: Asset = asset!("/assets/tailwind.css");

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("critic_chat=info")),
        )
        .init();

    dioxus::launch(App);
}

fn build_client(settings: &Settings) -> Option<AssistantClient> {
    match AssistantClient::new(&settings.server.base_url, settings.server.request_timeout_secs) {
        Ok(client) => Some(client),
        Err(e) => {
            error!(base_url = %settings.server.base_url, error = %e, "could not build HTTP client");
            None
        }
    }
}

fn open_history() -> ChatHistory {
    ChatHistory::open_default().unwrap_or_else(|e| {
        warn!(error = %e, "recent chats kept in the temp directory");
        ChatHistory::at(std::env::temp_dir().join("critic-chat").join("chats"))
    })
}

/// Logs in and reports the outcome as a flash message.
async fn log_in(
    client: AssistantClient,
    credentials: Credentials,
    mut logged_in_as: Signal<Option<String>>,
    flashes: Signal<FlashQueue>,
) {
    match client.login(&credentials.username, &credentials.password).await {
        Ok(()) => {
            logged_in_as.set(Some(credentials.username.clone()));
            flash(
                flashes,
                FlashKind::Success,
                format!("Logged in as {}", credentials.username),
            );
        }
        Err(e) => {
            warn!(username = %credentials.username, error = %e, "login failed");
            logged_in_as.set(None);
            flash(flashes, FlashKind::Error, format!("Login failed: {}", e));
        }
    }
}

#[component]
fn App() -> Element {
    // Load settings from disk on startup
    let mut app_settings = use_signal(Settings::load_or_default);
    let mut client = use_signal(|| build_client(&app_settings.peek()));

    let session = use_hook(ChatSession::new);
    let history = use_hook(open_history);

    let mut current_view = use_signal(|| AppView::Chat);
    let sidebar_collapsed = use_signal(|| false);
    let flashes = use_signal(FlashQueue::default);
    let mut logged_in_as = use_signal(|| None::<String>);
    let mut recent_chats = use_signal(Vec::<RecentChat>::new);
    let mut active_chat = use_signal(|| None::<String>);
    // Bumped to remount the chat view on "New Chat".
    let mut chat_epoch = use_signal(|| 0u32);

    // Mirror the session's chat id for the header and sidebar.
    use_future({
        let session = session.clone();
        move || {
            let mut chat_id = session.subscribe();
            async move {
                active_chat.set(chat_id.borrow_and_update().clone());
                while chat_id.changed().await.is_ok() {
                    active_chat.set(chat_id.borrow_and_update().clone());
                }
            }
        }
    });

    let reload_chats = {
        let history = history.clone();
        move || {
            let history = history.clone();
            spawn(async move {
                match tokio::task::spawn_blocking(move || history.list()).await {
                    Ok(chats) => recent_chats.set(chats),
                    Err(e) => warn!(error = %e, "could not list recent chats"),
                }
            });
        }
    };

    use_hook({
        let mut reload_chats = reload_chats.clone();
        move || reload_chats()
    });

    // Log in on startup when credentials are saved
    use_hook(move || {
        let settings = app_settings.peek();
        if let (Some(client), Some(credentials)) = (client.peek().clone(), settings.credentials.clone()) {
            if settings.has_credentials() {
                spawn(log_in(client, credentials, logged_in_as, flashes));
            }
        }
    });

    let new_chat = {
        let session = session.clone();
        move |_| {
            session.destroy();
            chat_epoch += 1;
            current_view.set(AppView::Chat);
        }
    };

    let select_chat = move |chat_id: String| {
        info!(chat_id = %chat_id, "opening stored chat");
        current_view.set(AppView::History(chat_id));
    };

    let forget_chat = {
        let history = history.clone();
        let reload_chats = reload_chats.clone();
        move |chat_id: String| {
            let history = history.clone();
            let mut reload_chats = reload_chats.clone();
            spawn(async move {
                match tokio::task::spawn_blocking(move || history.forget(&chat_id)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(error = %e, "could not forget chat"),
                    Err(e) => warn!(error = %e, "forget task failed"),
                }
                reload_chats();
            });
        }
    };

    let save_settings = {
        let session = session.clone();
        move |next: Settings| {
            if let Err(e) = next.save() {
                error!(error = %e, "failed to save settings");
                flash(flashes, FlashKind::Error, format!("Could not save settings: {}", e));
                return;
            }

            let server_changed = next.server != app_settings.peek().server;
            app_settings.set(next.clone());
            flash(flashes, FlashKind::Success, "Settings saved.");

            if server_changed {
                // A new client has a fresh cookie jar; the old chat belongs to the old server.
                session.destroy();
                logged_in_as.set(None);
                let rebuilt = build_client(&next);
                if let (Some(fresh), Some(credentials)) = (rebuilt.clone(), next.credentials.clone()) {
                    spawn(log_in(fresh, credentials, logged_in_as, flashes));
                }
                client.set(rebuilt);
            }
        }
    };

    let login = move |credentials: Credentials| {
        let Some(client) = client.peek().clone() else {
            flash(flashes, FlashKind::Error, "Set a valid server address first.");
            return;
        };
        spawn(log_in(client, credentials, logged_in_as, flashes));
    };

    let logout = {
        let session = session.clone();
        move |_| {
            let Some(client) = client.peek().clone() else {
                return;
            };
            let session = session.clone();
            spawn(async move {
                match client.logout().await {
                    Ok(()) => {
                        session.destroy();
                        logged_in_as.set(None);
                        flash(flashes, FlashKind::Info, "Logged out.");
                    }
                    Err(e) => {
                        warn!(error = %e, "logout failed");
                        flash(flashes, FlashKind::Error, e.user_message());
                    }
                }
            });
        }
    };

    let on_chat_recorded = {
        let mut reload_chats = reload_chats.clone();
        move |_| reload_chats()
    };

    let view = current_view();
    let client_now = client();

    rsx! {
        document::Link { rel: "stylesheet", href: TAILWIND_CSS }

        div {
            class: "font-inter antialiased bg-[var(--color-base-100)] text-[var(--color-base-content)]",

            div {
                class: "flex h-screen overflow-hidden",

                Sidebar {
                    chats: recent_chats,
                    active_chat,
                    collapsed: sidebar_collapsed,
                    on_new_chat: new_chat,
                    on_select_chat: select_chat,
                    on_forget_chat: forget_chat,
                }

                // Main content area
                div {
                    class: "relative flex flex-col flex-1 overflow-hidden min-h-0",

                    Header {
                        current_view,
                        active_chat,
                        logged_in_as,
                        on_navigate: move |next: AppView| current_view.set(next),
                    }

                    main {
                        class: "grow min-h-0",

                        match (view, client_now) {
                            (AppView::Settings, _) => rsx! {
                                SettingsView {
                                    settings: app_settings,
                                    logged_in_as,
                                    on_save: save_settings,
                                    on_login: login,
                                    on_logout: logout,
                                    on_close: move |_| current_view.set(AppView::Chat),
                                }
                            },
                            (_, None) => rsx! {
                                div {
                                    class: "p-10 text-center text-sm text-[var(--color-base-content)]/70",
                                    "The server address could not be used. Fix it in Settings."
                                }
                            },
                            (AppView::Chat, Some(client)) => rsx! {
                                Chat {
                                    key: "{client.base_url()}-chat-{chat_epoch}",
                                    client,
                                    session: session.clone(),
                                    settings: app_settings,
                                    history: history.clone(),
                                    initial_chat: None,
                                    flashes,
                                    on_chat_recorded,
                                }
                            },
                            (AppView::History(chat_id), Some(client)) => rsx! {
                                Chat {
                                    key: "{client.base_url()}-history-{chat_id}",
                                    client,
                                    session: session.clone(),
                                    settings: app_settings,
                                    history: history.clone(),
                                    initial_chat: Some(chat_id.clone()),
                                    flashes,
                                    on_chat_recorded,
                                }
                            },
                            (AppView::Simulation, Some(client)) => rsx! {
                                Simulation {
                                    key: "{client.base_url()}-simulation",
                                    client,
                                    poll_interval: app_settings.read().polling.simulation(),
                                    flashes,
                                }
                            },
                        }
                    }
                }
            }

            FlashStack { flashes }
        }
    }
}
