//! Lifecycle events and the fire-and-forget notification path.
//!
//! `LifecycleStore` emits one event per moved record, only after the batch holding
//! it has committed. A background task drains the channel into a `NotificationSink`.
//! Sink failures are logged and dropped; they never touch the store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::candidate::CandidateStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleTransition {
    Archived,
    Restored,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LifecycleEvent {
    pub event_id: Uuid,
    pub transition: LifecycleTransition,
    pub candidate_id: String,
    /// Status the candidate now reports in the partition it moved to.
    pub status: CandidateStatus,
    pub referrer_id: Option<String>,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification transport failed: {0}")]
    Transport(String),

    #[error("notification endpoint answered with status {0}")]
    Rejected(u16),
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, event: &LifecycleEvent) -> Result<(), NotifyError>;
}

/// Default sink: records referrer notifications in the service log.
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn notify(&self, event: &LifecycleEvent) -> Result<(), NotifyError> {
        match &event.referrer_id {
            Some(referrer) => info!(
                "Notify referrer {}: candidate {} {:?} ({})",
                referrer,
                event.candidate_id,
                event.transition,
                event.reason.as_deref().unwrap_or("no reason given")
            ),
            None => info!(
                "Candidate {} {:?}; no referrer to notify",
                event.candidate_id, event.transition
            ),
        }
        Ok(())
    }
}

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts every event as JSON to a configured endpoint.
pub struct WebhookNotificationSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotificationSink {
    pub fn new(url: String) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl NotificationSink for WebhookNotificationSink {
    async fn notify(&self, event: &LifecycleEvent) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(event)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }
        debug!(
            "Delivered {:?} event for candidate {}",
            event.transition, event.candidate_id
        );
        Ok(())
    }
}

/// Sending half handed to `LifecycleStore`. Publishing never blocks or fails the caller.
#[derive(Clone)]
pub struct EventPublisher {
    tx: Option<mpsc::UnboundedSender<LifecycleEvent>>,
}

impl EventPublisher {
    pub fn new(tx: mpsc::UnboundedSender<LifecycleEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Publisher that drops everything.
    #[cfg(test)]
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn publish(&self, event: LifecycleEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).is_err() {
                warn!("Lifecycle notifier has shut down; event dropped");
            }
        }
    }
}

/// Starts the notifier task and returns the publisher feeding it.
pub fn spawn_notifier(sink: Arc<dyn NotificationSink>) -> (EventPublisher, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<LifecycleEvent>();
    let handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Err(e) = sink.notify(&event).await {
                warn!(
                    "Notification for candidate {} ({:?}) failed: {e}",
                    event.candidate_id, event.transition
                );
            }
        }
    });
    (EventPublisher::new(tx), handle)
}
