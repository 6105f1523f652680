//! One-at-a-time playlist insertion
//!
//! The room acknowledges playlist additions without echoing a request id,
//! so only one request may be outstanding. Each item is sent, then the
//! synchronizer waits for the next queue signal before moving on.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};

use crate::error::{BotError, BotResult};
use crate::messages;
use crate::protocol::{OutboundEvent, QueueRequest};
use crate::transport::Transport;

const ALREADY_QUEUED: &str = "already on the playlist";

/// Terminal result of inserting one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Acknowledged,
    /// Accepted with a warning, including "already queued"
    Warned(String),
    Rejected {
        id: Option<String>,
        reason: String,
    },
}

impl EnqueueOutcome {
    /// Whether the item ended up on the playlist
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Acknowledged | Self::Warned(_))
    }
}

/// Queue responses forwarded by the event loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueSignal {
    Ack,
    Warn { msg: String },
    Fail { msg: String, id: Option<String> },
    /// The connection ended; no response will come
    Aborted,
}

/// Sender half used by the event loop
pub type SignalSender = mpsc::UnboundedSender<QueueSignal>;

fn is_already_queued(msg: &str) -> bool {
    msg.to_lowercase().contains(ALREADY_QUEUED)
}

pub struct QueueSynchronizer {
    transport: Arc<dyn Transport>,
    signals: Mutex<mpsc::UnboundedReceiver<QueueSignal>>,
    retry_delay: Duration,
    max_attempts: u32,
}

impl QueueSynchronizer {
    pub fn new(
        transport: Arc<dyn Transport>,
        retry_delay: Duration,
        max_attempts: u32,
    ) -> (Self, SignalSender) {
        let (tx, rx) = mpsc::unbounded_channel();
        let synchronizer = Self {
            transport,
            signals: Mutex::new(rx),
            retry_delay,
            max_attempts: max_attempts.max(1),
        };
        (synchronizer, tx)
    }

    /// Insert items strictly in order, one outstanding request at a time
    ///
    /// If the connection drops, the pending item and everything after it
    /// are reported as rejected.
    pub async fn submit(&self, ids: &[String]) -> Vec<(String, EnqueueOutcome)> {
        let mut outcomes = Vec::with_capacity(ids.len());
        let mut aborted = false;

        for id in ids {
            let outcome = if aborted {
                connection_lost(id)
            } else {
                match self.enqueue_one(id).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        tracing::warn!(id = %id, error = %e, "Enqueue aborted");
                        aborted = true;
                        connection_lost(id)
                    }
                }
            };
            outcomes.push((id.clone(), outcome));
        }

        outcomes
    }

    /// Insert a single item, retrying rejections up to the attempt limit
    pub async fn enqueue_one(&self, id: &str) -> BotResult<EnqueueOutcome> {
        let mut signals = self.signals.lock().await;
        drain_stale(&mut signals);

        for attempt in 1..=self.max_attempts {
            self.transport
                .emit(OutboundEvent::Queue(QueueRequest::video(id)))
                .await?;

            match signals.recv().await {
                Some(QueueSignal::Ack) => {
                    tracing::debug!(id, attempt, "Item acknowledged");
                    return Ok(EnqueueOutcome::Acknowledged);
                }
                Some(QueueSignal::Warn { msg }) => {
                    tracing::debug!(id, warning = %msg, "Item accepted with warning");
                    return Ok(EnqueueOutcome::Warned(msg));
                }
                Some(QueueSignal::Fail { msg, .. }) if is_already_queued(&msg) => {
                    tracing::debug!(id, "Item already queued");
                    return Ok(EnqueueOutcome::Warned(msg));
                }
                Some(QueueSignal::Fail { msg, id: failed_id }) => {
                    if attempt == self.max_attempts {
                        tracing::warn!(id, attempts = attempt, reason = %msg, "Giving up on item");
                        self.transport
                            .say(&messages::giving_up(id, self.max_attempts))
                            .await;
                        return Ok(EnqueueOutcome::Rejected {
                            id: failed_id.or_else(|| Some(id.to_string())),
                            reason: msg,
                        });
                    }

                    tracing::warn!(id, attempt, reason = %msg, "Enqueue rejected, retrying");
                    self.transport
                        .say(&messages::retrying(id, self.retry_delay))
                        .await;
                    tokio::time::sleep(self.retry_delay).await;
                }
                Some(QueueSignal::Aborted) | None => return Err(BotError::TransportClosed),
            }
        }

        // max_attempts >= 1, so the loop always returns
        Err(BotError::Internal(format!("no enqueue attempt made for {id}")))
    }
}

/// Drop responses that arrived while nothing was outstanding
///
/// A stale abort belongs to an earlier connection; if this one is down too
/// the next emit fails.
fn drain_stale(signals: &mut mpsc::UnboundedReceiver<QueueSignal>) {
    while let Ok(signal) = signals.try_recv() {
        tracing::trace!(?signal, "Discarding stale queue signal");
    }
}

fn connection_lost(id: &str) -> EnqueueOutcome {
    EnqueueOutcome::Rejected {
        id: Some(id.to_string()),
        reason: "connection lost".to_string(),
    }
}
