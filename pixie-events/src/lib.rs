//! Durable publish/subscribe: one named subject per business event, queue
//! groups for competing consumers, and explicit ack/nak for redelivery.
//!
//! The trait in this crate is backend-agnostic; [`memory`] backs tests and
//! `pixie-events-nats` backs production, mirroring how the teacher splits a
//! core event-bus crate from one backend crate per broker.

pub mod memory;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use pixie_core::types::{PhotoDeletedEvent, PhotoUploadedEvent, SUBJECT_PHOTO_DELETED, SUBJECT_PHOTO_UPLOADED};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventBusError {
    Timeout,
    Unavailable(String),
    Internal(String),
}

impl std::fmt::Display for EventBusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventBusError::Timeout => write!(f, "publish deadline exceeded"),
            EventBusError::Unavailable(msg) => write!(f, "event bus unavailable: {msg}"),
            EventBusError::Internal(msg) => write!(f, "event bus error: {msg}"),
        }
    }
}

impl std::error::Error for EventBusError {}

pixie_core::map_error!(EventBusError => Transient);

/// Subscription delivery policy, as named in the core's `subscribe` call:
/// manual ack (the handler decides ack vs nak rather than the backend
/// auto-acking on successful return), explicit ack (no implicit ack from a
/// prior message acks later ones), deliver-new (start from messages
/// published after the subscription is created, not the backlog).
#[derive(Debug, Clone, Copy)]
pub struct SubscribeOptions {
    pub manual_ack: bool,
    pub explicit_ack: bool,
    pub deliver_new: bool,
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self {
            manual_ack: true,
            explicit_ack: true,
            deliver_new: true,
        }
    }
}

struct AckState {
    inner: tokio::sync::Mutex<Option<tokio::sync::oneshot::Sender<AckDecision>>>,
}

/// The handler's verdict on a delivered message. Exposed so out-of-crate
/// backends (e.g. `pixie-events-nats`) can construct [`IncomingMessage`]
/// values of their own and translate the decision into their wire ack/nak.
pub enum AckDecision {
    Ack,
    Nak,
}

/// A delivered message. The handler must call [`ack`](IncomingMessage::ack)
/// or [`nak`](IncomingMessage::nak) exactly once; dropping it without either
/// is treated as an implicit nak so the message is redelivered.
pub struct IncomingMessage {
    pub subject: String,
    pub payload: Value,
    state: Arc<AckState>,
}

impl IncomingMessage {
    /// Construct a delivered message with a channel the backend reads once
    /// the handler calls `ack`/`nak` (or drops the message, an implicit nak).
    pub fn new(subject: String, payload: Value, decision_tx: tokio::sync::oneshot::Sender<AckDecision>) -> Self {
        Self {
            subject,
            payload,
            state: Arc::new(AckState {
                inner: tokio::sync::Mutex::new(Some(decision_tx)),
            }),
        }
    }

    pub async fn ack(&self) {
        self.send_decision(AckDecision::Ack).await;
    }

    pub async fn nak(&self) {
        self.send_decision(AckDecision::Nak).await;
    }

    async fn send_decision(&self, decision: AckDecision) {
        if let Some(tx) = self.state.inner.lock().await.take() {
            let _ = tx.send(decision);
        }
    }
}

pub type Handler =
    Arc<dyn Fn(IncomingMessage) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

#[async_trait]
pub trait EventBus: Send + Sync {
    /// `publish(subject, payload, ctx)`. Must fail fast — implementations
    /// enforce `pixie_core::deadlines::EVENT_PUBLISH_DEADLINE` internally
    /// rather than relying on the caller to wrap the call in a timeout.
    async fn publish(&self, subject: &str, payload: Value) -> Result<(), EventBusError>;

    /// `subscribe(subject, queueGroup, handler, opts)`. Registers `handler`
    /// for at-least-once delivery to one member of `queue_group`; returns
    /// once the subscription is live, not when it's torn down.
    async fn subscribe(
        &self,
        subject: &str,
        queue_group: &str,
        opts: SubscribeOptions,
        handler: Handler,
    ) -> Result<(), EventBusError>;
}

/// Publishes `photo.uploaded` with the bit-exact payload shape.
pub async fn publish_photo_uploaded(
    bus: &dyn EventBus,
    event: &PhotoUploadedEvent,
) -> Result<(), EventBusError> {
    let payload = serde_json::to_value(event).map_err(|e| EventBusError::Internal(e.to_string()))?;
    bus.publish(SUBJECT_PHOTO_UPLOADED, payload).await
}

/// Publishes `photo.deleted` with the bit-exact payload shape.
pub async fn publish_photo_deleted(
    bus: &dyn EventBus,
    event: &PhotoDeletedEvent,
) -> Result<(), EventBusError> {
    let payload = serde_json::to_value(event).map_err(|e| EventBusError::Internal(e.to_string()))?;
    bus.publish(SUBJECT_PHOTO_DELETED, payload).await
}
