use super::common::{flash, BubbleOptions, ChatDisplay, ChatInput};
use crate::utils::{
    mark_gave_up, reconcile, AssistantClient, ChatHistory, ChatSession, ComparisonSide,
    FlashKind, FlashQueue, MessageStore, OutputNumber, PollEvent, ProcessingPoller, RenderRequest,
    Role, ScoreSync, ScoreUpdate, SectionKey, Settings, REFRESH_MESSAGE_ID,
};
use dioxus::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

type Poller = Rc<RefCell<ProcessingPoller<AssistantClient>>>;

/// The assistant chat. Opens `initial_chat` (or the session's active chat)
/// from its stored transcript, otherwise asks the server for a new chat.
#[component]
pub fn Chat(
    client: AssistantClient,
    session: ChatSession,
    settings: Signal<Settings>,
    history: ChatHistory,
    initial_chat: Option<String>,
    flashes: Signal<FlashQueue>,
    on_chat_recorded: EventHandler<()>,
) -> Element {
    let store = use_signal(MessageStore::new);
    let mut second_assistant = use_signal(|| false);
    let mut is_sending = use_signal(|| false);

    // New assistant bubbles pick up the mode that is on when they arrive.
    use_effect(move || {
        let enabled = second_assistant();
        let mut store = store;
        store.write().set_second_assistant(enabled);
    });

    let backend = use_hook(|| Arc::new(client.clone()));

    let poller: Poller = use_hook({
        let backend = backend.clone();
        let session = session.clone();
        move || {
            let config = settings.peek().polling.processing();
            let (poller, events) = ProcessingPoller::new(backend, session.subscribe(), config);
            spawn(drain_poll_events(events, store));
            Rc::new(RefCell::new(poller))
        }
    });

    // Background badge refresh, only when badges are shown at all.
    let _score_sync = use_hook({
        let backend = backend.clone();
        let session = session.clone();
        move || {
            let settings = settings.peek();
            if !settings.features.critic_display {
                return None;
            }
            let (sync, updates) =
                ScoreSync::spawn(backend, session.subscribe(), settings.polling.score_sync());
            spawn(drain_score_updates(updates, session, store));
            Some(Rc::new(sync))
        }
    });

    use_hook({
        let client = client.clone();
        let session = session.clone();
        let poller = poller.clone();
        move || {
            let target = initial_chat.clone().or_else(|| session.chat_id());
            spawn(async move {
                match target {
                    Some(chat_id) => {
                        load_transcript(&client, &session, &poller, &chat_id, store, second_assistant)
                            .await
                    }
                    None => start_chat(&client, &session).await,
                }
            });
        }
    });

    let send_message = {
        let client = client.clone();
        let session = session.clone();
        let poller = poller.clone();
        let history = history.clone();
        move |text: String| {
            if *is_sending.peek() {
                return;
            }
            let client = client.clone();
            let session = session.clone();
            let poller = poller.clone();
            let history = history.clone();
            let delay = settings.peek().polling.send_delay();
            let mut store = store;

            spawn(async move {
                is_sending.set(true);
                store.write().push_dummies(&text);
                tokio::time::sleep(delay).await;

                let request = session.chat_request(text.clone());
                match client.send_message(&request).await {
                    Ok(reply) => {
                        session.adopt(reply.chat_id.as_deref());
                        let to_poll = store.write().apply_chat_reply(&reply);
                        for (message_id, output) in to_poll {
                            poller.borrow_mut().start(message_id, output);
                        }
                        if let Some(chat_id) = session.chat_id() {
                            record_chat(history, chat_id, text, on_chat_recorded);
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "sending user turn failed");
                        let mut store = store.write();
                        store.remove_dummies();
                        store.render_error(e.user_message());
                    }
                }
                is_sending.set(false);
            });
        }
    };

    let refresh = {
        let session = session.clone();
        let poller = poller.clone();
        let mut store = store;
        move |_| {
            session.destroy();
            let cancelled = poller.borrow().active_count();
            poller.borrow_mut().cancel_all();
            second_assistant.set(false);
            let mut store = store.write();
            store.clear();
            store.render_message(RenderRequest::new(
                REFRESH_MESSAGE_ID,
                "Session refreshed.",
                Role::System,
            ));
            info!(cancelled, "chat view refreshed");
        }
    };

    let toggle_second_assistant = {
        let client = client.clone();
        let session = session.clone();
        move |evt: FormEvent| {
            let enable = evt.checked();
            let chat_id = match session.require_chat_id() {
                Ok(chat_id) => chat_id,
                Err(e) => {
                    warn!("second assistant toggled without an active chat");
                    second_assistant.set(false);
                    flash(flashes, FlashKind::Info, e.user_message());
                    return;
                }
            };

            let previous = *second_assistant.peek();
            second_assistant.set(enable);
            let client = client.clone();
            spawn(async move {
                match client.set_second_assistant(&chat_id, enable).await {
                    Ok(allowed) => {
                        info!(chat_id = %chat_id, allowed, "second assistant updated");
                        second_assistant.set(allowed);
                    }
                    Err(e) => {
                        warn!(chat_id = %chat_id, error = %e, "second assistant toggle failed");
                        second_assistant.set(previous);
                        flash(flashes, FlashKind::Error, e.user_message());
                    }
                }
            });
        }
    };

    let prefer = {
        let client = client.clone();
        let session = session.clone();
        let poller = poller.clone();
        let mut store = store;
        move |(parent_id, output): (String, OutputNumber)| {
            let chat_id = match session.require_chat_id() {
                Ok(chat_id) => chat_id,
                Err(e) => {
                    flash(flashes, FlashKind::Error, e.user_message());
                    return;
                }
            };
            let client = client.clone();
            let poller = poller.clone();
            spawn(async move {
                match client.prefer_output(&chat_id, &parent_id, output).await {
                    Ok(()) => {
                        let hidden = store.write().prefer(&parent_id, output);
                        debug!(parent_id = %parent_id, ?hidden, "preferred output recorded");
                        // A hidden output no longer needs status updates.
                        if let Some(hidden) = hidden {
                            let mut poller = poller.borrow_mut();
                            if poller.is_polling(&hidden) {
                                poller.cancel(&hidden);
                            }
                        }
                    }
                    Err(e) => {
                        warn!(parent_id = %parent_id, error = %e, "preference not recorded");
                        flash(flashes, FlashKind::Error, e.user_message());
                    }
                }
            });
        }
    };

    let toggle_section = {
        let mut store = store;
        move |(message_id, key): (String, SectionKey)| {
            if let Some(view) = store.write().get_mut(&message_id) {
                view.toggle_section(key);
            }
        }
    };

    let choose = {
        let mut store = store;
        move |(message_id, side): (String, ComparisonSide)| {
            store.write().choose_comparison(&message_id, side);
        }
    };

    let features = settings.read().features.clone();
    let options = BubbleOptions {
        show_score: features.critic_display,
        show_prefer: features.dual_output,
        show_sections: features.extra_sections,
    };

    rsx! {
        div {
            class: "flex flex-col h-full min-h-0",

            // Toolbar
            div {
                class: "flex items-center justify-between gap-4 px-4 sm:px-6 py-2 border-b border-[var(--color-base-300)] bg-[var(--color-base-100)]",

                div {
                    class: "flex items-center gap-3",

                    if features.dual_output {
                        label {
                            class: "flex items-center gap-2 text-sm cursor-pointer text-[var(--color-base-content)]",
                            input {
                                r#type: "checkbox",
                                checked: second_assistant(),
                                onchange: toggle_second_assistant,
                                class: "w-4 h-4 accent-[var(--color-primary)]",
                            }
                            "Second assistant"
                        }
                    }
                }

                button {
                    onclick: refresh,
                    class: "px-3 py-1.5 rounded-lg bg-[var(--color-base-300)] text-[var(--color-base-content)] text-sm font-medium hover:bg-[var(--color-base-300)]/80 transition-all",
                    title: "Clear this conversation and start over",
                    "Refresh"
                }
            }

            ChatDisplay {
                messages: store.read().visible(),
                options,
                on_prefer: prefer,
                on_toggle_section: toggle_section,
                on_choose: choose,
            }

            ChatInput {
                disabled: is_sending(),
                on_send: send_message,
            }
        }
    }
}

async fn start_chat(client: &AssistantClient, session: &ChatSession) {
    match client.start_chat().await {
        Ok(chat_id) => session.create(chat_id),
        // The first send creates a chat server-side when none is active.
        Err(e) => warn!(error = %e, "could not start a chat"),
    }
}

/// Replays a stored chat and makes it the active one.
async fn load_transcript(
    client: &AssistantClient,
    session: &ChatSession,
    poller: &Poller,
    chat_id: &str,
    mut store: Signal<MessageStore>,
    mut second_assistant: Signal<bool>,
) {
    match client.fetch_transcript(chat_id).await {
        Ok(transcript) => {
            info!(chat_id, turns = transcript.messages.len(), "transcript loaded");
            session.create(transcript.id.clone());
            second_assistant.set(transcript.allow_second_assistant);
            let still_updating = store.write().replay_transcript(&transcript);
            for (message_id, output) in still_updating {
                poller.borrow_mut().start(message_id, output);
            }
        }
        Err(e) => {
            warn!(chat_id, error = %e, "could not load transcript");
            store.write().render_error(e.user_message());
        }
    }
}

fn record_chat(
    history: ChatHistory,
    chat_id: String,
    user_input: String,
    on_recorded: EventHandler<()>,
) {
    spawn(async move {
        let result =
            tokio::task::spawn_blocking(move || history.record(&chat_id, &user_input)).await;
        match result {
            Ok(Ok(_)) => on_recorded.call(()),
            Ok(Err(e)) => warn!(error = %e, "could not record chat"),
            Err(e) => warn!(error = %e, "chat record task failed"),
        }
    });
}

async fn drain_poll_events(
    mut events: mpsc::UnboundedReceiver<PollEvent>,
    mut store: Signal<MessageStore>,
) {
    while let Some(event) = events.recv().await {
        match event {
            PollEvent::Status {
                message_id,
                output,
                status,
            } => {
                let outcome = reconcile(&mut store.write(), &message_id, &status);
                debug!(message_id = %message_id, output = output.as_u8(), ?outcome, "status applied");
            }
            PollEvent::GaveUp { message_id, error } => {
                warn!(message_id = %message_id, error = %error, "processing poll gave up");
                mark_gave_up(&mut store.write(), &message_id);
            }
        }
    }
}

async fn drain_score_updates(
    mut updates: mpsc::UnboundedReceiver<ScoreUpdate>,
    session: ChatSession,
    mut store: Signal<MessageStore>,
) {
    while let Some(update) = updates.recv().await {
        // Scores for a chat that was refreshed away in the meantime.
        if session.chat_id().as_deref() != Some(update.chat_id.as_str()) {
            debug!(chat_id = %update.chat_id, "dropping stale scores");
            continue;
        }
        let stale = store
            .peek()
            .iter()
            .any(|view| {
                update.scores.iter().any(|entry| {
                    entry.id == view.id
                        && entry.critic_score.is_some()
                        && view.score.as_ref().map(|b| b.score) != entry.critic_score
                })
            });
        if stale {
            store.write().patch_scores(&update.scores);
        }
    }
}
