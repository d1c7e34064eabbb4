use super::common::{flash, TypingDots};
use crate::utils::{
    format_score, AssistantClient, ClientError, FlashKind, FlashQueue, LifecycleResponse,
    Role, RunStatus, SimulationEvent, SimulationFeed, SimulationPoller, KILLED_TEXT,
};
use dioxus::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Viewer for the server-driven two-party simulation.
#[component]
pub fn Simulation(
    client: AssistantClient,
    poll_interval: Duration,
    flashes: Signal<FlashQueue>,
) -> Element {
    let mut feed = use_signal(SimulationFeed::default);
    let mut poller = use_signal(|| None::<SimulationPoller>);

    let ensure_polling = {
        let client = client.clone();
        move || {
            if poller.peek().as_ref().is_some_and(SimulationPoller::is_running) {
                return false;
            }
            let (next, events) = SimulationPoller::spawn(Arc::new(client.clone()), poll_interval);
            poller.set(Some(next));
            spawn(drain_simulation_events(events, client.clone(), feed, flashes));
            true
        }
    };

    // Pick up a run that is already in progress.
    use_effect({
        let mut ensure_polling = ensure_polling.clone();
        move || {
            ensure_polling();
        }
    });

    let start = {
        let client = client.clone();
        let ensure_polling = ensure_polling.clone();
        move |_| {
            if poller.peek().as_ref().is_some_and(SimulationPoller::is_running)
                && feed.peek().status == RunStatus::Running
            {
                flash(flashes, FlashKind::Info, "Simulation already running.");
                return;
            }
            {
                let mut feed = feed.write();
                feed.clear();
                feed.starting = true;
            }
            let client = client.clone();
            let mut ensure_polling = ensure_polling.clone();
            spawn(async move {
                match client.start_simulation().await {
                    Ok(response) => {
                        let kind = if response.is_info() {
                            FlashKind::Info
                        } else {
                            FlashKind::Success
                        };
                        flash(flashes, kind, response.text_or("Simulation started successfully!"));
                        ensure_polling();
                    }
                    Err(e) => {
                        warn!(error = %e, "simulation start failed");
                        feed.write().starting = false;
                        flash(flashes, FlashKind::Error, e.user_message());
                    }
                }
            });
        }
    };

    let resume = {
        let client = client.clone();
        move |_| {
            let client = client.clone();
            let mut ensure_polling = ensure_polling.clone();
            spawn(async move {
                let result = client.continue_simulation().await;
                report(flashes, result, "Simulation resumed successfully!");
                ensure_polling();
            });
        }
    };

    let stop = {
        let client = client.clone();
        move |_| {
            let client = client.clone();
            spawn(async move {
                let result = client.stop_simulation().await;
                report(flashes, result, "Simulation stopped successfully!");
            });
        }
    };

    let current = feed.read();
    let controls = current.controls();
    let status_label = format!("{:?}", current.status);

    rsx! {
        div {
            class: "flex flex-col h-full min-h-0",

            // Toolbar
            div {
                class: "flex items-center justify-between gap-4 px-4 sm:px-6 py-2 border-b border-[var(--color-base-300)] bg-[var(--color-base-100)]",

                div {
                    class: "flex items-center gap-3 text-sm",
                    span {
                        class: "text-[var(--color-base-content)]/70",
                        "Status: "
                        span { class: "font-medium text-[var(--color-base-content)]", "{status_label}" }
                    }
                    if let Some(score) = current.critic_score {
                        span {
                            class: "px-2 py-0.5 rounded-full text-xs font-semibold bg-[var(--color-primary)] text-[var(--color-primary-content)]",
                            title: "Critic score of the latest reply",
                            "Critic: {format_score(score)}"
                        }
                    }
                }

                div {
                    class: "flex items-center gap-2",

                    if controls.show_start {
                        button {
                            onclick: start,
                            disabled: current.starting,
                            class: "px-3 py-1.5 rounded-lg bg-[var(--color-primary)] text-[var(--color-primary-content)] text-sm font-medium hover:bg-[var(--color-primary)]/90 disabled:opacity-60 transition-all",
                            "{controls.start_label}"
                        }
                    }
                    if controls.show_continue {
                        button {
                            onclick: resume,
                            class: "px-3 py-1.5 rounded-lg bg-[var(--color-base-300)] text-[var(--color-base-content)] text-sm font-medium hover:bg-[var(--color-base-300)]/80 transition-all",
                            "Continue"
                        }
                    }
                    if controls.show_stop {
                        button {
                            onclick: stop,
                            class: "px-3 py-1.5 rounded-lg bg-red-600 text-white text-sm font-medium hover:bg-red-600/90 transition-all",
                            "Stop"
                        }
                    }
                }
            }

            // Feed
            div {
                class: "flex-1 min-h-0 overflow-y-auto",

                div {
                    class: "max-w-4xl mx-auto px-4 py-6 space-y-4",

                    if current.entries.is_empty() && current.notices.is_empty() {
                        div {
                            class: "py-16 text-center text-sm text-[var(--color-base-content)]/60",
                            "Start a simulation to watch a generated user talk to the assistant."
                        }
                    }

                    for (index, entry) in current.entries.iter().cloned().enumerate() {
                        div {
                            key: "sim-{index}",
                            class: "flex w-full",
                            class: if entry.role == Role::User { "justify-end" } else { "justify-start" },

                            div {
                                class: "max-w-[80%] rounded-2xl px-4 py-3 shadow-sm",
                                class: if entry.role == Role::User {
                                    "bg-[var(--color-primary)] text-[var(--color-primary-content)]"
                                } else {
                                    "bg-[var(--color-base-200)] text-[var(--color-base-content)] border border-[var(--color-base-300)]"
                                },

                                p { class: "whitespace-pre-wrap break-words text-sm sm:text-base", "{entry.text}" }

                                for (block_index, block) in entry.search_outputs.iter().cloned().enumerate() {
                                    div {
                                        key: "sim-{index}-search-{block_index}",
                                        class: "mt-2",
                                        button {
                                            onclick: move |_| feed.write().toggle_search_output(index, block_index),
                                            class: "text-xs font-medium text-[var(--color-primary)] hover:underline",
                                            "{entry.search_output_toggle(block_index)}"
                                        }
                                        if block.expanded {
                                            pre {
                                                class: "mt-1 whitespace-pre-wrap break-words text-xs font-mono text-[var(--color-base-content)]/80",
                                                "{block.content}"
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }

                    for notice in current.notices.iter().copied() {
                        div {
                            key: "{notice.id}",
                            id: "{notice.id}",
                            class: "flex items-center justify-center gap-2 text-xs text-[var(--color-base-content)]/70",
                            TypingDots {}
                            span { "{notice.text}" }
                        }
                    }
                }
            }
        }
    }
}

fn report(
    flashes: Signal<FlashQueue>,
    result: Result<LifecycleResponse, ClientError>,
    fallback: &str,
) {
    match result {
        Ok(response) => {
            let kind = if response.is_info() {
                FlashKind::Info
            } else {
                FlashKind::Success
            };
            flash(flashes, kind, response.text_or(fallback));
        }
        Err(e) => {
            warn!(error = %e, "simulation request failed");
            flash(flashes, FlashKind::Error, e.user_message());
        }
    }
}

async fn drain_simulation_events(
    mut events: mpsc::UnboundedReceiver<SimulationEvent>,
    client: AssistantClient,
    mut feed: Signal<SimulationFeed>,
    flashes: Signal<FlashQueue>,
) {
    while let Some(event) = events.recv().await {
        match event {
            SimulationEvent::Status(status) => {
                let changed = feed.write().set_status(status);
                if changed && status == RunStatus::Killed {
                    warn!("simulation was killed by the server");
                    flash(flashes, FlashKind::Error, KILLED_TEXT);
                    if let Err(e) = client.stop_simulation().await {
                        warn!(error = %e, "stop after kill failed");
                    }
                }
            }
            SimulationEvent::Messages(messages) => {
                info!(count = messages.len(), "simulation messages received");
                feed.write().append(&messages);
            }
            SimulationEvent::Typing(typing) => feed.write().apply_typing(typing),
            SimulationEvent::CriticScore(score) => feed.write().critic_score = Some(score),
        }
    }
}
