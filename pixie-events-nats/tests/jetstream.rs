//! Requires a local NATS server with JetStream enabled
//! (`nats-server -js`) and `NATS_URL` pointing at it. Run with
//! `cargo test -p pixie-events-nats --features integration -- --ignored`.
#![cfg(feature = "integration")]

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::Mutex;

use pixie_events::{EventBus, IncomingMessage, SubscribeOptions};
use pixie_events_nats::NatsEventBus;

#[tokio::test]
#[ignore]
async fn publishes_and_delivers_through_a_durable_consumer() {
    let url = std::env::var("NATS_URL").unwrap_or_else(|_| "nats://127.0.0.1:4222".into());
    let bus = NatsEventBus::connect(&url).await.expect("connect to nats");
    bus.ensure_stream().await.expect("ensure stream");

    let received = Arc::new(Mutex::new(None));
    let received_clone = received.clone();

    bus.subscribe(
        "photo.uploaded",
        "integration-test-group",
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
    .expect("subscribe");

    bus.publish("photo.uploaded", json!({"id": "integration-test"}))
        .await
        .expect("publish");

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(*received.lock().await, Some(json!({"id": "integration-test"})));
}
