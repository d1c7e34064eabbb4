use crate::utils::{
    extract_search_outputs, toggle_label, RunStatus, Role, SimulationBackend, SimulationMessage, TypingStatus,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const PERSONA_NOTICE_ID: &str = "loading";
pub const USER_TYPING_NOTICE_ID: &str = "user_typing";
pub const ASSISTANT_TYPING_NOTICE_ID: &str = "assistant_typing";

pub const START_LABEL: &str = "Start Simulation";
pub const STARTING_LABEL: &str = "Simulation Running...";
pub const KILLED_TEXT: &str = "Simulation was killed after waiting too long";
const SEARCH_OUTPUT_TITLE: &str = "Search Output";

// ============================================================================
// Message cursor
// ============================================================================

/// Count of simulation messages already shown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MessageCursor {
    seen: usize,
}

impl MessageCursor {
    /// Returns only the messages beyond the cursor and advances it.
    pub fn take_new(&mut self, mut messages: Vec<SimulationMessage>) -> Vec<SimulationMessage> {
        if messages.len() <= self.seen {
            return Vec::new();
        }
        let fresh = messages.split_off(self.seen);
        self.seen += fresh.len();
        fresh
    }
}

// ============================================================================
// Feed state
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct SearchOutputBlock {
    pub content: String,
    pub expanded: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SimulationEntry {
    pub role: Role,
    pub text: String,
    pub search_outputs: Vec<SearchOutputBlock>,
}

impl SimulationEntry {
    /// Toggle text for one search-output block, numbered from 1.
    pub fn search_output_toggle(&self, block: usize) -> String {
        let expanded = self.search_outputs.get(block).is_some_and(|b| b.expanded);
        toggle_label(expanded, &format!("{} {}", SEARCH_OUTPUT_TITLE, block + 1))
    }

    fn from_message(message: &SimulationMessage) -> Self {
        if message.role != Role::Assistant {
            return Self {
                role: message.role,
                text: message.content.clone(),
                search_outputs: Vec::new(),
            };
        }
        let extracted = extract_search_outputs(&message.content);
        Self {
            role: message.role,
            text: extracted.display_text,
            search_outputs: extracted
                .search_outputs
                .into_iter()
                .map(|content| SearchOutputBlock {
                    content,
                    expanded: false,
                })
                .collect(),
        }
    }
}

/// Transient system line keyed by a fixed id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SystemNotice {
    pub id: &'static str,
    pub text: &'static str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimulationControls {
    pub show_start: bool,
    pub show_stop: bool,
    pub show_continue: bool,
    pub start_label: &'static str,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SimulationFeed {
    pub entries: Vec<SimulationEntry>,
    pub notices: Vec<SystemNotice>,
    pub status: RunStatus,
    pub critic_score: Option<f64>,
    pub starting: bool,
}

impl SimulationFeed {
    pub fn append(&mut self, messages: &[SimulationMessage]) {
        self.entries
            .extend(messages.iter().map(SimulationEntry::from_message));
    }

    /// Mirrors the typing flags as notices; repeated calls never duplicate one.
    pub fn apply_typing(&mut self, typing: TypingStatus) {
        let wanted = [
            (
                typing.creating_persona,
                SystemNotice {
                    id: PERSONA_NOTICE_ID,
                    text: "A persona is being generated, please wait...",
                },
            ),
            (
                typing.user_typing,
                SystemNotice {
                    id: USER_TYPING_NOTICE_ID,
                    text: "User is typing...",
                },
            ),
            (
                typing.assistant_typing,
                SystemNotice {
                    id: ASSISTANT_TYPING_NOTICE_ID,
                    text: "Assistant is typing...",
                },
            ),
        ];
        for (active, notice) in wanted {
            let present = self.notices.iter().any(|n| n.id == notice.id);
            if active && !present {
                self.notices.push(notice);
            } else if !active && present {
                self.notices.retain(|n| n.id != notice.id);
            }
        }
    }

    /// Returns `true` when the status changed.
    pub fn set_status(&mut self, status: RunStatus) -> bool {
        if status != RunStatus::Running && status != RunStatus::Paused {
            self.starting = false;
            self.notices.clear();
        }
        if self.status == status {
            return false;
        }
        info!(from = ?self.status, to = ?status, "simulation status changed");
        self.status = status;
        true
    }

    pub fn controls(&self) -> SimulationControls {
        match self.status {
            RunStatus::Running => SimulationControls {
                show_start: false,
                show_stop: true,
                show_continue: false,
                start_label: STARTING_LABEL,
            },
            RunStatus::Paused => SimulationControls {
                show_start: false,
                show_stop: true,
                show_continue: true,
                start_label: STARTING_LABEL,
            },
            _ => SimulationControls {
                show_start: true,
                show_stop: false,
                show_continue: false,
                start_label: if self.starting {
                    STARTING_LABEL
                } else {
                    START_LABEL
                },
            },
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.notices.clear();
        self.critic_score = None;
    }

    pub fn toggle_search_output(&mut self, entry: usize, block: usize) {
        if let Some(block) = self
            .entries
            .get_mut(entry)
            .and_then(|e| e.search_outputs.get_mut(block))
        {
            block.expanded = !block.expanded;
        }
    }
}

// ============================================================================
// Poller
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub enum SimulationEvent {
    Status(RunStatus),
    Messages(Vec<SimulationMessage>),
    Typing(TypingStatus),
    CriticScore(f64),
}

/// Polls the run status every period; messages and typing flags are fetched
/// only while running. Ends on its own once the run is stopped or killed.
pub struct SimulationPoller {
    handle: JoinHandle<()>,
}

impl SimulationPoller {
    pub fn spawn<B: SimulationBackend>(
        backend: Arc<B>,
        period: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<SimulationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(simulation_loop(backend, period, tx));
        (Self { handle }, rx)
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for SimulationPoller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn simulation_loop<B: SimulationBackend>(
    backend: Arc<B>,
    period: Duration,
    tx: mpsc::UnboundedSender<SimulationEvent>,
) {
    let mut cursor = MessageCursor::default();
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let status = match backend.running_status().await {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "simulation status fetch failed");
                continue;
            }
        };
        if tx.send(SimulationEvent::Status(status)).is_err() {
            break;
        }

        match status {
            RunStatus::Stopped | RunStatus::Killed => {
                debug!(?status, "simulation polling finished");
                break;
            }
            RunStatus::Running => {}
            _ => continue,
        }

        match backend.messages().await {
            Ok(messages) => {
                let fresh = cursor.take_new(messages);
                let ends_with_assistant = fresh.last().is_some_and(|m| m.role == Role::Assistant);
                if !fresh.is_empty() && tx.send(SimulationEvent::Messages(fresh)).is_err() {
                    break;
                }
                if ends_with_assistant {
                    match backend.critic_score().await {
                        Ok(Some(score)) => {
                            let _ = tx.send(SimulationEvent::CriticScore(score));
                        }
                        Ok(None) => {}
                        Err(e) => warn!(error = %e, "simulation critic fetch failed"),
                    }
                }
            }
            Err(e) => warn!(error = %e, "simulation messages fetch failed"),
        }

        match backend.typing().await {
            Ok(typing) => {
                if tx.send(SimulationEvent::Typing(typing)).is_err() {
                    break;
                }
            }
            Err(e) => warn!(error = %e, "typing status fetch failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ClientError;
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn message(role: Role, content: &str) -> SimulationMessage {
        SimulationMessage {
            role,
            content: content.to_string(),
        }
    }

    fn conversation(len: usize) -> Vec<SimulationMessage> {
        (0..len)
            .map(|i| {
                let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
                message(role, &format!("turn {}", i))
            })
            .collect()
    }

    #[test]
    fn test_cursor_appends_only_new_messages() {
        let mut cursor = MessageCursor::default();
        assert_eq!(cursor.take_new(conversation(3)).len(), 3);

        let fresh = cursor.take_new(conversation(5));
        assert_eq!(fresh, conversation(5)[3..].to_vec());
        assert_eq!(cursor.seen, 5);

        assert!(cursor.take_new(conversation(5)).is_empty());
        assert!(cursor.take_new(conversation(2)).is_empty());
    }

    #[test]
    fn test_assistant_entries_extract_search_outputs() {
        let mut feed = SimulationFeed::default();
        feed.append(&[
            message(Role::User, "Any hotels? <search_output>not parsed</search_output>"),
            message(
                Role::Assistant,
                "Two options.<search_output>Hotel A</search_output><search_output>Hotel B</search_output>",
            ),
        ]);

        assert_eq!(feed.entries[0].search_outputs.len(), 0);
        let assistant = &feed.entries[1];
        assert_eq!(assistant.text, "Two options.");
        assert_eq!(assistant.search_outputs.len(), 2);

        assert_eq!(assistant.search_output_toggle(0), "Show Search Output 1");
        assert_eq!(assistant.search_output_toggle(1), "Show Search Output 2");

        feed.toggle_search_output(1, 1);
        assert!(!feed.entries[1].search_outputs[0].expanded);
        assert!(feed.entries[1].search_outputs[1].expanded);
        assert_eq!(feed.entries[1].search_output_toggle(0), "Show Search Output 1");
        assert_eq!(feed.entries[1].search_output_toggle(1), "Hide Search Output 2");
    }

    #[test]
    fn test_typing_notices_are_keyed() {
        let mut feed = SimulationFeed::default();
        let typing = TypingStatus {
            user_typing: true,
            assistant_typing: false,
            creating_persona: true,
        };
        feed.apply_typing(typing);
        feed.apply_typing(typing);

        let ids: Vec<_> = feed.notices.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![PERSONA_NOTICE_ID, USER_TYPING_NOTICE_ID]);

        feed.apply_typing(TypingStatus {
            assistant_typing: true,
            ..Default::default()
        });
        let ids: Vec<_> = feed.notices.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![ASSISTANT_TYPING_NOTICE_ID]);
    }

    #[test]
    fn test_controls_follow_status() {
        let mut feed = SimulationFeed::default();
        feed.starting = true;
        assert_eq!(feed.controls().start_label, STARTING_LABEL);

        feed.set_status(RunStatus::Running);
        let controls = feed.controls();
        assert!(controls.show_stop && !controls.show_start && !controls.show_continue);

        feed.set_status(RunStatus::Paused);
        let controls = feed.controls();
        assert!(controls.show_stop && controls.show_continue && !controls.show_start);

        assert!(feed.set_status(RunStatus::Stopped));
        assert!(!feed.set_status(RunStatus::Stopped));
        let controls = feed.controls();
        assert!(controls.show_start && !controls.show_stop && !controls.show_continue);
        assert_eq!(controls.start_label, START_LABEL);
    }

    struct ScriptedSimulation {
        statuses: Mutex<VecDeque<RunStatus>>,
        messages: Mutex<VecDeque<Vec<SimulationMessage>>>,
        critic_calls: Mutex<usize>,
    }

    impl SimulationBackend for ScriptedSimulation {
        fn running_status(&self) -> BoxFuture<'_, Result<RunStatus, ClientError>> {
            let next = self.statuses.lock().unwrap().pop_front();
            async move { Ok(next.unwrap_or(RunStatus::Stopped)) }.boxed()
        }

        fn messages(&self) -> BoxFuture<'_, Result<Vec<SimulationMessage>, ClientError>> {
            let next = self.messages.lock().unwrap().pop_front().unwrap_or_default();
            async move { Ok(next) }.boxed()
        }

        fn typing(&self) -> BoxFuture<'_, Result<TypingStatus, ClientError>> {
            async { Ok(TypingStatus::default()) }.boxed()
        }

        fn critic_score(&self) -> BoxFuture<'_, Result<Option<f64>, ClientError>> {
            *self.critic_calls.lock().unwrap() += 1;
            async { Ok(Some(7.0)) }.boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_streams_new_messages_until_killed() {
        let backend = Arc::new(ScriptedSimulation {
            statuses: Mutex::new(
                vec![RunStatus::Running, RunStatus::Paused, RunStatus::Running, RunStatus::Killed]
                    .into(),
            ),
            messages: Mutex::new(vec![conversation(3), conversation(5)].into()),
            critic_calls: Mutex::new(0),
        });
        let (poller, mut rx) = SimulationPoller::spawn(Arc::clone(&backend), Duration::from_secs(1));

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        let appended: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                SimulationEvent::Messages(m) => Some(m.len()),
                _ => None,
            })
            .collect();
        assert_eq!(appended, vec![3, 2]);
        assert_eq!(events.last(), Some(&SimulationEvent::Status(RunStatus::Killed)));
        // Turn 2 (user) ends the first batch; turn 4 (user) ends the second.
        assert_eq!(*backend.critic_calls.lock().unwrap(), 0);
        tokio::task::yield_now().await;
        assert!(!poller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_critic_fetched_after_assistant_message() {
        let backend = Arc::new(ScriptedSimulation {
            statuses: Mutex::new(vec![RunStatus::Running].into()),
            messages: Mutex::new(vec![conversation(2)].into()),
            critic_calls: Mutex::new(0),
        });
        let (_poller, mut rx) = SimulationPoller::spawn(Arc::clone(&backend), Duration::from_secs(1));

        let mut scores = Vec::new();
        while let Some(event) = rx.recv().await {
            if let SimulationEvent::CriticScore(score) = event {
                scores.push(score);
            }
        }
        assert_eq!(scores, vec![7.0]);
    }
}
