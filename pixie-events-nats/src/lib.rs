//! NATS JetStream backend for the durable event bus. Disk-backed streams
//! give the >= 7 day retention window the core requires; queue-group
//! delivery maps onto a durable pull consumer per `(subject, queue_group)`.

use std::time::Duration;

use async_nats::jetstream::consumer::{AckPolicy, DeliverPolicy};
use async_nats::jetstream::stream::{Config as StreamConfig, StorageType};
use async_nats::jetstream::{self, AckKind};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::oneshot;

use pixie_core::deadlines::EVENT_PUBLISH_DEADLINE;
use pixie_events::{AckDecision, EventBus, EventBusError, Handler, IncomingMessage, SubscribeOptions};

const STREAM_NAME: &str = "PIXIE_EVENTS";
const STREAM_SUBJECTS: &str = "photo.>";
const RETENTION: Duration = Duration::from_secs(7 * 24 * 3600);

pub struct NatsEventBus {
    context: jetstream::Context,
}

impl NatsEventBus {
    pub async fn connect(nats_url: &str) -> Result<Self, EventBusError> {
        let client = async_nats::connect(nats_url)
            .await
            .map_err(|e| EventBusError::Unavailable(e.to_string()))?;
        Ok(Self {
            context: jetstream::new(client),
        })
    }

    /// Create the durable stream backing every `photo.*` subject if it
    /// doesn't already exist. Called once at bootstrap.
    pub async fn ensure_stream(&self) -> Result<(), EventBusError> {
        self.context
            .get_or_create_stream(StreamConfig {
                name: STREAM_NAME.to_string(),
                subjects: vec![STREAM_SUBJECTS.to_string()],
                max_age: RETENTION,
                storage: StorageType::File,
                ..Default::default()
            })
            .await
            .map_err(|e| EventBusError::Internal(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl EventBus for NatsEventBus {
    async fn publish(&self, subject: &str, payload: Value) -> Result<(), EventBusError> {
        let bytes = serde_json::to_vec(&payload).map_err(|e| EventBusError::Internal(e.to_string()))?;

        let ack = tokio::time::timeout(EVENT_PUBLISH_DEADLINE, self.context.publish(subject.to_string(), bytes.into()))
            .await
            .map_err(|_| EventBusError::Timeout)?
            .map_err(|e| EventBusError::Unavailable(e.to_string()))?;

        tokio::time::timeout(EVENT_PUBLISH_DEADLINE, ack)
            .await
            .map_err(|_| EventBusError::Timeout)?
            .map_err(|e| EventBusError::Unavailable(e.to_string()))?;

        Ok(())
    }

    async fn subscribe(
        &self,
        subject: &str,
        queue_group: &str,
        opts: SubscribeOptions,
        handler: Handler,
    ) -> Result<(), EventBusError> {
        let stream = self
            .context
            .get_stream(STREAM_NAME)
            .await
            .map_err(|e| EventBusError::Internal(e.to_string()))?;

        let deliver_policy = if opts.deliver_new {
            DeliverPolicy::New
        } else {
            DeliverPolicy::All
        };

        let consumer = stream
            .get_or_create_consumer(
                queue_group,
                jetstream::consumer::pull::Config {
                    durable_name: Some(queue_group.to_string()),
                    filter_subject: subject.to_string(),
                    deliver_policy,
                    ack_policy: AckPolicy::Explicit,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| EventBusError::Internal(e.to_string()))?;

        let subject = subject.to_string();
        tokio::spawn(async move {
            let mut messages = match consumer.messages().await {
                Ok(messages) => messages,
                Err(e) => {
                    tracing::error!(error = %e, subject = %subject, "failed to open consumer message stream");
                    return;
                }
            };

            while let Some(delivery) = messages.next().await {
                let message = match delivery {
                    Ok(message) => message,
                    Err(e) => {
                        tracing::warn!(error = %e, subject = %subject, "jetstream delivery error");
                        continue;
                    }
                };

                let payload: Value = match serde_json::from_slice(&message.payload) {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::error!(error = %e, subject = %subject, "dropping undecodable message");
                        let _ = message.ack_with(AckKind::Term).await;
                        continue;
                    }
                };

                let (decision_tx, decision_rx) = oneshot::channel();
                let incoming = IncomingMessage::new(subject.clone(), payload, decision_tx);
                handler(incoming).await;

                match decision_rx.await {
                    Ok(AckDecision::Ack) => {
                        let _ = message.ack().await;
                    }
                    Ok(AckDecision::Nak) | Err(_) => {
                        let _ = message.ack_with(AckKind::Nak).await;
                    }
                }
            }
        });

        Ok(())
    }
}
