// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Notifier
//!
//! Drains the notification queue and fans every [`Notification`] out to the
//! webhooks registered for its topic.
//!
//! ```text
//! Listener ──Delivery──▶ decode ──▶ list_by_topic ──▶ POST hook 1
//!                          │             │            POST hook 2
//!                          ▼             ▼               ...
//!                       errors()      errors()        errors() (per hook)
//! ```
//!
//! Failures are soft: a bad payload, a topic without hooks or a failing hook
//! is reported and the loop moves on. Remaining hooks still receive the
//! event. Only the delivery stream closing ends the loop, with
//! [`NotifierError::MessagesClosed`].
//!
//! Errors go to the channel returned by [`Notifier::errors`] when one has
//! been taken, otherwise to the log. Reporting never blocks dispatch: a full
//! or dropped channel also falls back to the log.

use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::config::NotifierConfig;
use crate::domain::notification::{EventMessage, Notification, NOTIFICATION_QUEUE};
use crate::domain::queue::{Delivery, Listener, Publisher, QueueError};
use crate::domain::repository::{RepositoryError, WebhookRepository};
use crate::infrastructure::metrics;
use crate::infrastructure::webhook_client::{WebhookClient, WebhookError};

#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("unable to decode notification: {0}")]
    Decode(String),

    #[error("unable to look up webhooks for topic {topic}: {reason}")]
    WebhookLookup { topic: String, reason: String },

    #[error("no webhooks for topic {topic}")]
    NoWebhooks { topic: String },

    #[error("error response from hook {url}. code: ({status}): {body}")]
    Delivery {
        url: String,
        status: u16,
        body: String,
    },

    #[error("unable to post event to hook {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("errors channel already taken")]
    ErrorsAlreadyTaken,

    #[error("notification messages closed")]
    MessagesClosed,

    #[error("unable to listen for notifications: {0}")]
    Listen(#[from] QueueError),
}

impl From<WebhookError> for NotifierError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::Transport { url, reason } => NotifierError::Transport { url, reason },
            WebhookError::Status { url, status, body } => {
                NotifierError::Delivery { url, status, body }
            }
        }
    }
}

type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

pub struct Notifier {
    listener: Arc<dyn Listener>,
    webhooks: Arc<dyn WebhookRepository>,
    client: WebhookClient,
    errors_tx: mpsc::Sender<NotifierError>,
    errors_rx: Mutex<Option<mpsc::Receiver<NotifierError>>>,
    errors_attached: AtomicBool,
    last_timestamp: AtomicI64,
    clock: Clock,
}

impl Notifier {
    pub fn new(
        listener: Arc<dyn Listener>,
        webhooks: Arc<dyn WebhookRepository>,
        client: WebhookClient,
        error_buffer: usize,
    ) -> Self {
        let (errors_tx, errors_rx) = mpsc::channel(error_buffer.max(1));
        Self {
            listener,
            webhooks,
            client,
            errors_tx,
            errors_rx: Mutex::new(Some(errors_rx)),
            errors_attached: AtomicBool::new(false),
            last_timestamp: AtomicI64::new(i64::MIN),
            clock: Arc::new(|| chrono::Utc::now().timestamp()),
        }
    }

    pub fn from_config(
        listener: Arc<dyn Listener>,
        webhooks: Arc<dyn WebhookRepository>,
        config: &NotifierConfig,
    ) -> anyhow::Result<Self> {
        let client = WebhookClient::new(config.request_timeout())?;
        Ok(Self::new(listener, webhooks, client, config.error_buffer))
    }

    /// Replace the wall clock used for `EventMessage.timestamp`.
    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Soft errors from dispatch. Only the first call gets the channel.
    pub fn errors(&self) -> Result<mpsc::Receiver<NotifierError>, NotifierError> {
        let rx = self
            .errors_rx
            .lock()
            .take()
            .ok_or(NotifierError::ErrorsAlreadyTaken)?;
        self.errors_attached.store(true, Ordering::SeqCst);
        Ok(rx)
    }

    /// Consume notifications until the delivery stream closes or `shutdown`
    /// fires. A closed stream is reported as [`NotifierError::MessagesClosed`]
    /// so that the caller can rebuild the listener and start again.
    pub async fn start(&self, shutdown: CancellationToken) -> Result<(), NotifierError> {
        let mut deliveries = self.listener.listen().await?;
        info!("Notifier consuming notifications");

        loop {
            let delivery = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Notifier shutting down");
                    return Ok(());
                }
                delivery = deliveries.next() => delivery,
            };

            match delivery {
                Some(delivery) => self.dispatch(delivery).await,
                None => {
                    warn!("Notification delivery stream closed");
                    return Err(NotifierError::MessagesClosed);
                }
            }
        }
    }

    async fn dispatch(&self, delivery: Delivery) {
        let notification: Notification = match serde_json::from_slice(&delivery.body) {
            Ok(notification) => notification,
            Err(e) => {
                metrics::record_notifier_delivery("decode_error");
                self.report(NotifierError::Decode(e.to_string()));
                return;
            }
        };

        let hooks = match self.webhooks.list_by_topic(&notification.topic).await {
            Ok(hooks) if !hooks.is_empty() => hooks,
            Ok(_) | Err(RepositoryError::NotFound(_)) => {
                metrics::record_notifier_delivery("no_webhooks");
                self.report(NotifierError::NoWebhooks {
                    topic: notification.topic,
                });
                return;
            }
            Err(e) => {
                self.report(NotifierError::WebhookLookup {
                    topic: notification.topic,
                    reason: e.to_string(),
                });
                return;
            }
        };

        let event = EventMessage::from_notification(&notification, self.next_timestamp());
        debug!(
            topic = %notification.topic,
            event = %event.event,
            hooks = hooks.len(),
            "Dispatching notification"
        );

        for hook in hooks {
            match self.client.deliver(&hook.url, &event).await {
                Ok(()) => metrics::record_notifier_delivery("delivered"),
                Err(e) => {
                    metrics::record_notifier_delivery("failed");
                    self.report(e.into());
                }
            }
        }
    }

    fn next_timestamp(&self) -> i64 {
        let now = (self.clock)();
        let previous = self.last_timestamp.fetch_max(now, Ordering::SeqCst);
        previous.max(now)
    }

    fn report(&self, err: NotifierError) {
        if !self.errors_attached.load(Ordering::SeqCst) {
            warn!(error = %err, "Notifier error");
            return;
        }
        if let Err(e) = self.errors_tx.try_send(err) {
            match e {
                mpsc::error::TrySendError::Full(err) => {
                    error!(error = %err, "Notifier errors channel full; dropping to log")
                }
                mpsc::error::TrySendError::Closed(err) => {
                    warn!(error = %err, "Notifier errors receiver dropped")
                }
            }
        }
    }

    /// Encode `notification` and publish it on the notification queue.
    pub async fn publish_notification(
        publisher: &dyn Publisher,
        notification: &Notification,
    ) -> Result<(), QueueError> {
        let body = serde_json::to_vec(notification).map_err(|e| QueueError::Publish {
            queue: NOTIFICATION_QUEUE.to_string(),
            reason: e.to_string(),
        })?;
        publisher
            .publish(Bytes::from(body), "application/json")
            .await
    }
}
