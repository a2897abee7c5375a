// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Callback Listener Tests
 * Exercises the blind-XSS listener over loopback: correlation,
 * idempotent execution transitions, forensic logging, clean shutdown
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::sync::Arc;

use seitti_scanner::callback_server::{CallbackServer, PayloadStatus, PayloadTracker};

#[tokio::test]
async fn test_callback_always_answers_ok() {
    let tracker = Arc::new(PayloadTracker::new());
    let server = CallbackServer::start(0, Arc::clone(&tracker)).await.unwrap();
    let base = format!("http://{}", server.local_addr());

    let response = reqwest::get(format!("{}/?id=ffffffff", base)).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "OK");

    // Arbitrary paths answer OK too; the victim browser never sees an error
    let response = reqwest::get(format!("{}/some/odd/path?x=1", base))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "OK");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_correlated_callback_marks_payload_executed() {
    let tracker = Arc::new(PayloadTracker::new());
    let server = CallbackServer::start(0, Arc::clone(&tracker)).await.unwrap();
    let base = format!("http://{}", server.local_addr());

    let payload_id = tracker.register_payload(
        Some("mat-input-1"),
        Some("q"),
        "<svg onload=fetch(...)>",
        "http://target/#/search",
    );

    let response = reqwest::Client::new()
        .get(format!("{}/?id={}", base, payload_id))
        .header("User-Agent", "VictimBrowser/1.0")
        .header("Referer", "http://target/#/search")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let payload = tracker.payload(&payload_id).unwrap();
    assert_eq!(payload.status, PayloadStatus::Executed);
    assert!(payload.callback_id.is_some());
    assert!(payload.executed_at.is_some());

    let callbacks = tracker.received_snapshot();
    assert_eq!(callbacks.len(), 1);
    assert_eq!(callbacks[0].payload_id.as_deref(), Some(payload_id.as_str()));
    assert_eq!(callbacks[0].user_agent, "VictimBrowser/1.0");
    assert_eq!(callbacks[0].referer, "http://target/#/search");
    assert_eq!(callbacks[0].path, "/");
    assert_eq!(callbacks[0].query["id"], vec![payload_id.clone()]);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_second_callback_is_logged_but_transition_is_terminal() {
    let tracker = Arc::new(PayloadTracker::new());
    let server = CallbackServer::start(0, Arc::clone(&tracker)).await.unwrap();
    let base = format!("http://{}", server.local_addr());

    let payload_id = tracker.register_payload(None, Some("comment"), "p", "http://target/feedback");
    let url = format!("{}/?id={}", base, payload_id);

    reqwest::get(&url).await.unwrap();
    let first = tracker.payload(&payload_id).unwrap();
    let first_callback = first.callback_id.clone().unwrap();
    let first_executed_at = first.executed_at.clone().unwrap();

    reqwest::get(&url).await.unwrap();
    let second = tracker.payload(&payload_id).unwrap();

    // First write wins: the terminal state keeps its original proof
    assert_eq!(second.status, PayloadStatus::Executed);
    assert_eq!(second.callback_id.as_deref(), Some(first_callback.as_str()));
    assert_eq!(
        second.executed_at.as_deref(),
        Some(first_executed_at.as_str())
    );
    assert_eq!(tracker.received_snapshot().len(), 2);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_uncorrelated_callback_recorded_for_review() {
    let tracker = Arc::new(PayloadTracker::new());
    let server = CallbackServer::start(0, Arc::clone(&tracker)).await.unwrap();
    let base = format!("http://{}", server.local_addr());

    reqwest::get(format!("{}/probe", base)).await.unwrap();
    reqwest::get(format!("{}/?id=00000000", base)).await.unwrap();

    let callbacks = tracker.received_snapshot();
    assert_eq!(callbacks.len(), 2);
    assert!(tracker.executed_payloads().is_empty());

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_callbacks_race_payload_registration() {
    let tracker = Arc::new(PayloadTracker::new());
    let server = CallbackServer::start(0, Arc::clone(&tracker)).await.unwrap();
    let base = format!("http://{}", server.local_addr());

    // Register and call back concurrently; the single-mutex tracker
    // must never lose an update.
    let mut handles = Vec::new();
    for _ in 0..10 {
        let tracker = Arc::clone(&tracker);
        let base = base.clone();
        handles.push(tokio::spawn(async move {
            let id = tracker.register_payload(None, Some("q"), "p", "http://target/");
            reqwest::get(format!("{}/?id={}", base, id)).await.unwrap();
            id
        }));
    }

    for handle in handles {
        let id = handle.await.unwrap();
        assert_eq!(
            tracker.payload(&id).unwrap().status,
            PayloadStatus::Executed
        );
    }

    assert_eq!(tracker.executed_payloads().len(), 10);
    assert_eq!(tracker.received_snapshot().len(), 10);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_joins_within_grace() {
    let tracker = Arc::new(PayloadTracker::new());
    let server = CallbackServer::start(0, Arc::clone(&tracker)).await.unwrap();
    let addr = server.local_addr();

    server.stop().await.unwrap();

    // Socket is released after stop
    let rebound = tokio::net::TcpListener::bind(addr).await;
    assert!(rebound.is_ok());
}
