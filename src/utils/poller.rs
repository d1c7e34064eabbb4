use crate::utils::{
    apply_sections, poll_key, ChatBackend, ClientError, CriticResult, MessageStore, OutputNumber,
    ProcessingOverlay, ProcessingStatus, RegenerationComparison, ScoreBadge,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub const GAVE_UP_TEXT: &str = "Error: lost contact with the server while processing.";

#[derive(Clone, Debug, PartialEq)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_consecutive_failures: u32,
    pub max_backoff: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            max_consecutive_failures: 30,
            max_backoff: Duration::from_millis(30_000),
        }
    }
}

impl PollConfig {
    /// Delay before the next tick after `failures` failed ticks in a row.
    pub fn delay_after(&self, failures: u32) -> Duration {
        if failures == 0 {
            return self.interval;
        }
        let factor = 2u32.saturating_pow(failures.min(16));
        self.interval.saturating_mul(factor).min(self.max_backoff)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PollEvent {
    Status {
        message_id: String,
        output: OutputNumber,
        status: ProcessingStatus,
    },
    GaveUp {
        message_id: String,
        error: ClientError,
    },
}

/// Runs one status poll per assistant message, each in its own task.
pub struct ProcessingPoller<B: ChatBackend> {
    backend: Arc<B>,
    chat_id: watch::Receiver<Option<String>>,
    config: PollConfig,
    events: mpsc::UnboundedSender<PollEvent>,
    tasks: HashMap<String, JoinHandle<()>>,
}

impl<B: ChatBackend> ProcessingPoller<B> {
    pub fn new(
        backend: Arc<B>,
        chat_id: watch::Receiver<Option<String>>,
        config: PollConfig,
    ) -> (Self, mpsc::UnboundedReceiver<PollEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let poller = Self {
            backend,
            chat_id,
            config,
            events,
            tasks: HashMap::new(),
        };
        (poller, rx)
    }

    /// Starts polling for `message_id`, replacing any poll already running for
    /// that id. Polls for other ids are unaffected.
    pub fn start(&mut self, message_id: impl Into<String>, output: OutputNumber) {
        let message_id = message_id.into();
        self.tasks.retain(|_, handle| !handle.is_finished());
        if let Some(previous) = self.tasks.remove(&message_id) {
            debug!(message_id = %message_id, "replacing running poll");
            previous.abort();
        }

        let task = poll_loop(
            Arc::clone(&self.backend),
            self.chat_id.clone(),
            self.config.clone(),
            self.events.clone(),
            message_id.clone(),
            output,
        );
        self.tasks.insert(message_id, tokio::spawn(task));
    }

    pub fn cancel(&mut self, message_id: &str) -> bool {
        match self.tasks.remove(message_id) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
    }

    pub fn is_polling(&self, message_id: &str) -> bool {
        self.tasks
            .get(message_id)
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn active_count(&self) -> usize {
        self.tasks.values().filter(|h| !h.is_finished()).count()
    }
}

impl<B: ChatBackend> Drop for ProcessingPoller<B> {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

async fn poll_loop<B: ChatBackend>(
    backend: Arc<B>,
    chat_id: watch::Receiver<Option<String>>,
    config: PollConfig,
    events: mpsc::UnboundedSender<PollEvent>,
    message_id: String,
    output: OutputNumber,
) {
    let mut failures = 0u32;

    loop {
        // Read at fetch time so a refresh mid-poll is observed.
        let current = chat_id.borrow().clone();
        let Some(current) = current else {
            debug!(message_id = %message_id, "no active chat, skipping tick");
            tokio::time::sleep(config.interval).await;
            continue;
        };

        match backend.fetch_status(poll_key(&current, output)).await {
            Ok(status) => {
                failures = 0;
                let terminal = status.is_terminal();
                let event = PollEvent::Status {
                    message_id: message_id.clone(),
                    output,
                    status,
                };
                if events.send(event).is_err() || terminal {
                    break;
                }
            }
            Err(e) => {
                failures += 1;
                warn!(
                    message_id = %message_id,
                    failures,
                    error = %e,
                    "processing status tick failed"
                );
                if failures >= config.max_consecutive_failures {
                    error!(message_id = %message_id, "giving up on processing status");
                    let _ = events.send(PollEvent::GaveUp {
                        message_id: message_id.clone(),
                        error: e,
                    });
                    break;
                }
            }
        }

        tokio::time::sleep(config.delay_after(failures)).await;
    }
}

// ============================================================================
// Reconciliation
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// The message is no longer in the store.
    Missing,
    Processing,
    Failed,
    Completed { regenerated: bool },
}

/// Applies one status snapshot to the message it belongs to.
pub fn reconcile(store: &mut MessageStore, message_id: &str, status: &ProcessingStatus) -> PollOutcome {
    let Some(view) = store.get_mut(message_id) else {
        return PollOutcome::Missing;
    };

    if !status.is_terminal() {
        if view.original_draft.is_none() {
            if !view.text.trim().is_empty() {
                view.original_draft = Some(view.text.clone());
            } else if let Some(draft) = status.assistant_response.as_deref() {
                view.text = draft.to_string();
                view.original_draft = Some(draft.to_string());
            }
        }
        view.overlay = Some(ProcessingOverlay {
            step: status.step.clone(),
            progress: status.progress,
        });
        apply_sections(&mut view.sections, &status.extra_data());
        return PollOutcome::Processing;
    }

    view.overlay = None;

    if status.is_error() {
        let detail = status.error.as_deref().unwrap_or("processing failed");
        warn!(message_id, error = detail, "server reported processing error");
        view.text = format!("Error: {}", detail);
        return PollOutcome::Failed;
    }

    let regenerated = match (
        status.regenerated_response.as_deref(),
        status.final_response.as_deref(),
    ) {
        (Some(improved), Some(final_response)) => {
            let original = view
                .original_draft
                .clone()
                .unwrap_or_else(|| final_response.to_string());
            view.comparison = Some(RegenerationComparison::build(
                original,
                improved.to_string(),
                status.critic_result.as_ref(),
                status.regenerated_critic.as_ref(),
            ));
            view.text = improved.to_string();
            true
        }
        (_, Some(final_response)) => {
            view.text = final_response.to_string();
            false
        }
        _ => false,
    };
    apply_sections(&mut view.sections, &status.extra_data());

    let critic = if regenerated {
        status
            .regenerated_critic
            .as_ref()
            .or(status.critic_result.as_ref())
    } else {
        status.critic_result.as_ref()
    };
    if let Some(payload) = critic.filter(|v| !v.is_null()) {
        match CriticResult::parse(payload) {
            Ok(critic) => view.score = Some(ScoreBadge::new(critic.total_score, regenerated)),
            Err(e) => warn!(message_id, error = %e, "critic score left unchanged"),
        }
    }

    info!(message_id, regenerated, "processing completed");
    PollOutcome::Completed { regenerated }
}

/// Marks a message whose poll ran out of retries.
pub fn mark_gave_up(store: &mut MessageStore, message_id: &str) {
    if let Some(view) = store.get_mut(message_id) {
        view.overlay = None;
        view.text = GAVE_UP_TEXT.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::critic::BadgeTone;
    use crate::utils::{
        ComparisonSide, CriticView, RenderRequest, Role, ScoreEntry, SectionBody, SectionKey,
    };
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    #[derive(Default)]
    struct FakeBackend {
        responses: Mutex<VecDeque<Result<ProcessingStatus, ClientError>>>,
        keys: Mutex<Vec<String>>,
    }

    impl FakeBackend {
        fn with(responses: Vec<Result<ProcessingStatus, ClientError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                keys: Mutex::new(Vec::new()),
            })
        }

        fn keys(&self) -> Vec<String> {
            self.keys.lock().unwrap().clone()
        }
    }

    impl ChatBackend for FakeBackend {
        fn fetch_status(&self, key: String) -> BoxFuture<'_, Result<ProcessingStatus, ClientError>> {
            self.keys.lock().unwrap().push(key.clone());
            let next = self.responses.lock().unwrap().pop_front();
            async move {
                next.unwrap_or_else(|| {
                    Err(ClientError::Transport {
                        url: key,
                        detail: "connection refused".to_string(),
                    })
                })
            }
            .boxed()
        }

        fn fetch_scores(&self, _chat_id: String) -> BoxFuture<'_, Result<Vec<ScoreEntry>, ClientError>> {
            async { Ok(Vec::new()) }.boxed()
        }
    }

    fn processing(step: &str, progress: f64) -> ProcessingStatus {
        serde_json::from_value(json!({"status": "processing", "step": step, "progress": progress}))
            .unwrap()
    }

    fn status(value: serde_json::Value) -> ProcessingStatus {
        serde_json::from_value(value).unwrap()
    }

    fn store_with(id: &str, text: &str) -> MessageStore {
        let mut store = MessageStore::new();
        store.render_message(
            RenderRequest::new(id, text, Role::Assistant).linked("p1", OutputNumber::First),
        );
        store
    }

    fn config() -> PollConfig {
        PollConfig {
            interval: Duration::from_secs(1),
            max_consecutive_failures: 3,
            max_backoff: Duration::from_secs(30),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_stops_at_terminal_status() {
        let backend = FakeBackend::with(vec![
            Ok(processing("extracting_ner", 10.0)),
            Ok(status(json!({"status": "completed", "completed": true, "final_response": "done"}))),
        ]);
        let (_tx, chat_rx) = watch::channel(Some("c1".to_string()));
        let (mut poller, mut events) = ProcessingPoller::new(Arc::clone(&backend), chat_rx, config());

        poller.start("a1", OutputNumber::First);

        let first = events.recv().await.unwrap();
        assert!(matches!(first, PollEvent::Status { ref status, .. } if !status.is_terminal()));
        let second = events.recv().await.unwrap();
        assert!(matches!(second, PollEvent::Status { ref status, .. } if status.is_terminal()));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(backend.keys(), vec!["c1".to_string(), "c1".to_string()]);
        assert!(!poller.is_polling("a1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_gives_up_after_consecutive_failures() {
        let backend = FakeBackend::with(Vec::new());
        let (_tx, chat_rx) = watch::channel(Some("c1".to_string()));
        let (mut poller, mut events) = ProcessingPoller::new(Arc::clone(&backend), chat_rx, config());

        let started = Instant::now();
        poller.start("a2", OutputNumber::Second);

        match events.recv().await.unwrap() {
            PollEvent::GaveUp { message_id, error } => {
                assert_eq!(message_id, "a2");
                assert!(matches!(error, ClientError::Transport { .. }));
            }
            other => panic!("unexpected event {:?}", other),
        }
        // Two backoff sleeps: 2s then 4s.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(6) && elapsed < Duration::from_secs(7));
        assert_eq!(backend.keys(), vec!["c1_second".to_string(); 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_without_chat_are_skipped_not_failed() {
        let backend = FakeBackend::with(vec![Ok(status(json!({"completed": true})))]);
        let (chat_tx, chat_rx) = watch::channel(None);
        let (mut poller, mut events) = ProcessingPoller::new(Arc::clone(&backend), chat_rx, config());

        poller.start("a1", OutputNumber::First);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(backend.keys().is_empty());
        assert!(poller.is_polling("a1"));

        chat_tx.send_replace(Some("c9".to_string()));
        assert!(matches!(events.recv().await, Some(PollEvent::Status { .. })));
        assert_eq!(backend.keys(), vec!["c9".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_for_different_messages_run_concurrently() {
        let backend = FakeBackend::with(vec![
            Ok(processing("extracting_ner", 5.0)),
            Ok(processing("extracting_ner", 5.0)),
        ]);
        let (_tx, chat_rx) = watch::channel(Some("c1".to_string()));
        let (mut poller, mut events) = ProcessingPoller::new(Arc::clone(&backend), chat_rx, config());

        poller.start("a1", OutputNumber::First);
        poller.start("a2", OutputNumber::Second);
        events.recv().await.unwrap();
        events.recv().await.unwrap();

        assert!(poller.is_polling("a1"));
        assert!(poller.is_polling("a2"));
        assert_eq!(poller.active_count(), 2);
        let mut keys = backend.keys();
        keys.sort();
        assert_eq!(keys, vec!["c1".to_string(), "c1_second".to_string()]);

        poller.start("a1", OutputNumber::First);
        assert_eq!(poller.active_count(), 2);

        poller.cancel_all();
        tokio::task::yield_now().await;
        assert_eq!(poller.active_count(), 0);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = PollConfig {
            interval: Duration::from_secs(1),
            max_consecutive_failures: 30,
            max_backoff: Duration::from_secs(30),
        };
        assert_eq!(config.delay_after(0), Duration::from_secs(1));
        assert_eq!(config.delay_after(1), Duration::from_secs(2));
        assert_eq!(config.delay_after(3), Duration::from_secs(8));
        assert_eq!(config.delay_after(10), Duration::from_secs(30));
    }

    #[test]
    fn test_terminal_payload_sets_text_and_green_badge() {
        let mut store = store_with("a1", "");
        let outcome = reconcile(
            &mut store,
            "a1",
            &status(json!({
                "completed": true,
                "final_response": "Paris is the capital.",
                "critic_result": {"total_score": 9}
            })),
        );

        assert_eq!(outcome, PollOutcome::Completed { regenerated: false });
        let view = store.get("a1").unwrap();
        assert_eq!(view.text, "Paris is the capital.");
        let badge = view.score.as_ref().unwrap();
        assert_eq!(badge.label(), "9");
        assert_eq!(badge.tone, BadgeTone::Good);
    }

    #[rstest]
    #[case(4.0, BadgeTone::Poor)]
    #[case(6.0, BadgeTone::Fair)]
    fn test_terminal_badge_colors(#[case] score: f64, #[case] tone: BadgeTone) {
        let mut store = store_with("a1", "");
        reconcile(
            &mut store,
            "a1",
            &status(json!({"completed": true, "final_response": "ok", "critic_result": {"total_score": score}})),
        );
        assert_eq!(store.get("a1").unwrap().score.as_ref().unwrap().tone, tone);
    }

    #[test]
    fn test_processing_keeps_draft_and_shows_partial_sections() {
        let mut store = store_with("a1", "first draft");
        let mut partial = processing("generating_assistant_response", 40.0);
        partial.thinking = Some("considering budget".to_string());
        partial.assistant_response = Some("server draft".to_string());

        assert_eq!(reconcile(&mut store, "a1", &partial), PollOutcome::Processing);

        let view = store.get("a1").unwrap();
        assert_eq!(view.text, "first draft");
        assert_eq!(view.original_draft.as_deref(), Some("first draft"));
        assert_eq!(view.overlay.as_ref().unwrap().label(), "Generating Assistant Response (40%)");
        assert_eq!(view.sections.len(), 1);
        assert_eq!(view.sections[0].key, SectionKey::Thinking);
    }

    #[test]
    fn test_regenerated_payload_builds_comparison() {
        let mut store = store_with("a1", "");
        let mut partial = processing("evaluating_response", 70.0);
        partial.assistant_response = Some("original answer".to_string());
        reconcile(&mut store, "a1", &partial);

        let outcome = reconcile(
            &mut store,
            "a1",
            &status(json!({
                "completed": true,
                "final_response": "original answer",
                "regenerated_response": "better answer",
                "critic_result": {"total_score": 4},
                "regenerated_critic": {"total_score": 8.5}
            })),
        );

        assert_eq!(outcome, PollOutcome::Completed { regenerated: true });
        let view = store.get("a1").unwrap();
        assert_eq!(view.text, "better answer");
        assert!(view.overlay.is_none());
        let comparison = view.comparison.as_ref().unwrap();
        assert_eq!(comparison.original, "original answer");
        assert_eq!(comparison.selected, ComparisonSide::Improved);
        assert!(comparison.improved_critic.is_some());
        let badge = view.score.as_ref().unwrap();
        assert_eq!(badge.tone, BadgeTone::Regenerated);
        assert_eq!(badge.label(), "8.5");
    }

    #[test]
    fn test_unparseable_critic_shows_fallback_without_badge() {
        let mut store = store_with("a1", "");
        reconcile(
            &mut store,
            "a1",
            &status(json!({"completed": true, "final_response": "ok", "critic_result": "{oops"})),
        );

        let view = store.get("a1").unwrap();
        assert_eq!(view.score, None);
        assert_eq!(
            view.sections[0].body,
            SectionBody::Critic(CriticView::Unavailable)
        );
    }

    #[test]
    fn test_error_status_and_give_up_text() {
        let mut store = store_with("a1", "draft");
        let outcome = reconcile(
            &mut store,
            "a1",
            &status(json!({"status": "error", "error": "search failed"})),
        );
        assert_eq!(outcome, PollOutcome::Failed);
        assert_eq!(store.get("a1").unwrap().text, "Error: search failed");

        mark_gave_up(&mut store, "a1");
        assert_eq!(store.get("a1").unwrap().text, GAVE_UP_TEXT);
        assert_eq!(reconcile(&mut store, "gone", &ProcessingStatus::default()), PollOutcome::Missing);
    }
}
