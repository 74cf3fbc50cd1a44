//! In-process event bus backing tests: an mpsc queue per `(subject, queue
//! group)` pair that redelivers to the back of the queue on nak.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex};

use pixie_core::deadlines::EVENT_PUBLISH_DEADLINE;

use crate::{AckDecision, EventBus, EventBusError, Handler, IncomingMessage, SubscribeOptions};

type GroupKey = (String, String);

#[derive(Default)]
pub struct MemoryEventBus {
    groups: Arc<Mutex<HashMap<GroupKey, mpsc::UnboundedSender<Value>>>>,
}

impl MemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventBus for MemoryEventBus {
    async fn publish(&self, subject: &str, payload: Value) -> Result<(), EventBusError> {
        let send = async {
            let groups = self.groups.lock().await;
            for ((subj, _group), tx) in groups.iter() {
                if subj == subject {
                    let _ = tx.send(payload.clone());
                }
            }
        };
        tokio::time::timeout(EVENT_PUBLISH_DEADLINE, send)
            .await
            .map_err(|_| EventBusError::Timeout)
    }

    async fn subscribe(
        &self,
        subject: &str,
        queue_group: &str,
        _opts: SubscribeOptions,
        handler: Handler,
    ) -> Result<(), EventBusError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
        self.groups
            .lock()
            .await
            .insert((subject.to_string(), queue_group.to_string()), tx.clone());

        let subject = subject.to_string();
        tokio::spawn(async move {
            while let Some(payload) = rx.recv().await {
                let (decision_tx, decision_rx) = oneshot::channel();
                let message = IncomingMessage::new(subject.clone(), payload.clone(), decision_tx);
                handler(message).await;

                match decision_rx.await {
                    Ok(AckDecision::Nak) | Err(_) => {
                        tracing::debug!(subject = %subject, "nak received, redelivering");
                        let _ = tx.send(payload);
                    }
                    Ok(AckDecision::Ack) => {}
                }
            }
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn delivers_published_message_to_subscriber() {
        let bus = MemoryEventBus::new();
        let received = Arc::new(Mutex::new(None));
        let received_clone = received.clone();

        bus.subscribe(
            "photo.uploaded",
            "thumbnail-workers",
            SubscribeOptions::default(),
            Arc::new(move |msg: IncomingMessage| {
                let received = received_clone.clone();
                Box::pin(async move {
                    *received.lock().await = Some(msg.payload.clone());
                    msg.ack().await;
                })
            }),
        )
        .await
        .unwrap();

        bus.publish("photo.uploaded", json!({"id": "abc"})).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(*received.lock().await, Some(json!({"id": "abc"})));
    }

    #[tokio::test]
    async fn nak_redelivers_until_ack() {
        let bus = MemoryEventBus::new();
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();

        bus.subscribe(
            "photo.deleted",
            "indexers",
            SubscribeOptions::default(),
            Arc::new(move |msg: IncomingMessage| {
                let attempts = attempts_clone.clone();
                Box::pin(async move {
                    let count = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    if count < 3 {
                        msg.nak().await;
                    } else {
                        msg.ack().await;
                    }
                })
            }),
        )
        .await
        .unwrap();

        bus.publish("photo.deleted", json!({"id": "xyz"})).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn distinct_queue_groups_each_get_a_copy() {
        let bus = MemoryEventBus::new();
        let group_a = Arc::new(AtomicUsize::new(0));
        let group_b = Arc::new(AtomicUsize::new(0));

        for (group, counter) in [("group-a", group_a.clone()), ("group-b", group_b.clone())] {
            bus.subscribe(
                "photo.uploaded",
                group,
                SubscribeOptions::default(),
                Arc::new(move |msg: IncomingMessage| {
                    let counter = counter.clone();
                    Box::pin(async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        msg.ack().await;
                    })
                }),
            )
            .await
            .unwrap();
        }

        bus.publish("photo.uploaded", json!({"id": "1"})).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(group_a.load(Ordering::SeqCst), 1);
        assert_eq!(group_b.load(Ordering::SeqCst), 1);
    }
}
