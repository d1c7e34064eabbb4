use crate::utils::{ChatBackend, ScoreEntry};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Scores fetched for the chat that was active at fetch time.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoreUpdate {
    pub chat_id: String,
    pub scores: Vec<ScoreEntry>,
}

/// Session-long loop re-fetching critic scores so badges computed after a
/// message's own poll ended still show up. Stops when dropped.
pub struct ScoreSync {
    handle: JoinHandle<()>,
}

impl ScoreSync {
    pub fn spawn<B: ChatBackend>(
        backend: Arc<B>,
        chat_id: watch::Receiver<Option<String>>,
        period: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<ScoreUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(sync_loop(backend, chat_id, period, tx));
        (Self { handle }, rx)
    }
}

impl Drop for ScoreSync {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn sync_loop<B: ChatBackend>(
    backend: Arc<B>,
    chat_id: watch::Receiver<Option<String>>,
    period: Duration,
    tx: mpsc::UnboundedSender<ScoreUpdate>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick completes immediately; scores are not ready that early.
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let current = chat_id.borrow().clone();
        let Some(current) = current else { continue };

        match backend.fetch_scores(current.clone()).await {
            Ok(scores) => {
                debug!(chat_id = %current, count = scores.len(), "scores fetched");
                let update = ScoreUpdate {
                    chat_id: current,
                    scores,
                };
                if tx.send(update).is_err() {
                    break;
                }
            }
            // Skip this tick and try again at the next interval.
            Err(e) => warn!(chat_id = %current, error = %e, "score sync failed"),
        }
    }
}
