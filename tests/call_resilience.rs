//! End-to-end behaviour of resilient calls against scripted transports.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::Instant;

use courier::client::{CallError, CallOptions, ResilientServiceClient};
use courier::config::BreakerConfig;
use courier::resilience::CircuitStatus;
use courier::transport::TransportError;

mod common;
use common::{ObservedTransport, ScriptedTransport, Step};

#[tokio::test(start_paused = true)]
async fn test_two_failures_then_success() {
    let scripted = ScriptedTransport::fail_then_succeed(2, json!({ "id": 7 }));
    let transport = ObservedTransport::new(scripted.clone());
    let client = ResilientServiceClient::new("user", transport.clone());
    transport.watch(client.breaker("get-user-profile"));

    let started = Instant::now();
    let reply = client
        .send("get-user-profile", json!({ "userId": 7 }), CallOptions::new().max_attempts(3))
        .await
        .unwrap();

    assert_eq!(reply, json!({ "id": 7 }));
    assert_eq!(scripted.calls(), 3);
    // Linear backoff: 1000 ms after the first failure, 2000 ms after the second.
    assert_eq!(started.elapsed(), Duration::from_millis(3000));

    // Breaker state as each attempt began: one failure recorded per failed attempt.
    let failures: Vec<u32> = transport.seen().iter().map(|s| s.failure_count).collect();
    assert_eq!(failures, vec![0, 1, 2]);
    assert!(transport.seen().iter().all(|s| s.success_count == 0));

    // Then exactly one success, which clears the failure streak.
    let state = client.breaker_state("get-user-profile").unwrap();
    assert_eq!(state.status, CircuitStatus::Closed);
    assert_eq!(state.success_count, 1);
    assert_eq!(state.failure_count, 0);
    assert!(state.last_failure_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_two_failures_trip_a_threshold_of_two() {
    let transport = ScriptedTransport::fail_then_succeed(2, json!({ "ok": true }));
    let client = ResilientServiceClient::new("user", transport.clone()).with_breaker_config(BreakerConfig {
        threshold: 2,
        cooldown_ms: 60_000,
    });

    client
        .send("get-user-profile", json!({}), CallOptions::new())
        .await
        .unwrap();

    // The breaker gates whole calls, so the attempt already in progress finishes
    // and the next call is refused.
    let err = client
        .send("get-user-profile", json!({}), CallOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CallError::CircuitOpen { .. }));
    assert_eq!(transport.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_open_breaker_never_reaches_transport() {
    let transport = ScriptedTransport::always_ok();
    let client = ResilientServiceClient::new("lesson", transport.clone());

    let breaker = client.breaker("get-lesson");
    for _ in 0..5 {
        breaker.record_failure();
    }
    let before = breaker.snapshot();

    let started = Instant::now();
    let err = client
        .send("get-lesson", json!({}), CallOptions::new())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        CallError::CircuitOpen {
            destination: "lesson".into(),
            operation: "get-lesson".into()
        }
    );
    assert_eq!(transport.calls(), 0);
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(breaker.snapshot(), before);
}

#[tokio::test(start_paused = true)]
async fn test_every_attempt_times_out() {
    let transport = ScriptedTransport::always_hang();
    let client = ResilientServiceClient::new("quiz", transport.clone());

    let err = client
        .send(
            "submit-answer",
            json!({}),
            CallOptions::new().timeout_ms(250).max_attempts(4),
        )
        .await
        .unwrap_err();

    assert_eq!(err, CallError::Timeout { timeout_ms: 250 });
    assert_eq!(transport.calls(), 4);
    let state = client.breaker_state("submit-answer").unwrap();
    assert_eq!(state.failure_count, 4);
    assert_eq!(state.status, CircuitStatus::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_last_error_is_surfaced_unchanged() {
    let transport = ScriptedTransport::new(vec![
        Step::Hang,
        Step::Reply(json!({ "error": "quota exceeded" })),
        Step::Fail(TransportError::Other("connection reset".into())),
    ]);
    let client = ResilientServiceClient::new("media", transport.clone());

    let err = client
        .send("upload", json!({}), CallOptions::new().timeout_ms(100))
        .await
        .unwrap_err();

    assert_eq!(err, CallError::Transport(TransportError::Other("connection reset".into())));
    assert_eq!(client.breaker_state("upload").unwrap().failure_count, 3);
}

#[tokio::test(start_paused = true)]
async fn test_slow_reply_within_budget_succeeds() {
    let transport = ScriptedTransport::new(vec![Step::Slow(
        Duration::from_millis(400),
        json!({ "ok": true }),
    )]);
    let client = ResilientServiceClient::new("media", transport.clone());

    let reply = client
        .send("thumbnail", json!({}), CallOptions::new().timeout_ms(500))
        .await
        .unwrap();
    assert_eq!(reply["ok"], true);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_breaker_opens_and_recovers_after_cooldown() {
    let mut script = vec![Step::Fail(TransportError::Disconnected); 5];
    script.push(Step::Reply(json!({ "lesson": "intro" })));
    let transport = ScriptedTransport::new(script);

    let client = ResilientServiceClient::new("lesson", transport.clone()).with_breaker_config(BreakerConfig {
        threshold: 5,
        cooldown_ms: 60_000,
    });
    let once = CallOptions::new().max_attempts(1);

    for _ in 0..5 {
        let err = client.send("get-lesson", json!({}), once).await.unwrap_err();
        assert_eq!(err, CallError::Transport(TransportError::Disconnected));
    }
    assert_eq!(client.breaker("get-lesson").status(), CircuitStatus::Open);

    let err = client.send("get-lesson", json!({}), once).await.unwrap_err();
    assert!(matches!(err, CallError::CircuitOpen { .. }));
    assert_eq!(transport.calls(), 5);

    tokio::time::advance(Duration::from_millis(61_000)).await;

    let reply = client.send("get-lesson", json!({}), once).await.unwrap();
    assert_eq!(reply, json!({ "lesson": "intro" }));
    assert_eq!(transport.calls(), 6);

    let state = client.breaker_state("get-lesson").unwrap();
    assert_eq!(state.status, CircuitStatus::Closed);
    assert_eq!(state.failure_count, 0);
    assert_eq!(state.success_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_probe_reopens() {
    let transport = ScriptedTransport::always_fail();
    let client = ResilientServiceClient::new("lesson", transport.clone());
    let once = CallOptions::new().max_attempts(1);

    for _ in 0..5 {
        let _ = client.send("get-lesson", json!({}), once).await;
    }
    let opened_at = client.breaker_state("get-lesson").unwrap().last_failure_at;

    tokio::time::advance(Duration::from_millis(60_000)).await;
    let err = client.send("get-lesson", json!({}), once).await.unwrap_err();
    assert_eq!(err, CallError::Transport(TransportError::Disconnected));

    let state = client.breaker_state("get-lesson").unwrap();
    assert_eq!(state.status, CircuitStatus::Open);
    assert!(state.last_failure_at >= opened_at);
    assert_eq!(transport.calls(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_disabled_breaker_never_fast_fails() {
    let transport = ScriptedTransport::always_fail();
    let client = ResilientServiceClient::new("analytics", transport.clone());
    let options = CallOptions::new().max_attempts(1).use_circuit_breaker(false);

    for _ in 0..8 {
        let err = client.emit("track", json!({}), options).await.unwrap_err();
        assert!(matches!(err, CallError::Transport(_)));
    }
    assert_eq!(transport.calls(), 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_failures_are_all_counted() {
    let transport = ScriptedTransport::always_fail();
    let client = Arc::new(ResilientServiceClient::new("user", transport.clone()).with_breaker_config(
        BreakerConfig {
            threshold: 1000,
            cooldown_ms: 60_000,
        },
    ));

    let mut tasks = Vec::new();
    for _ in 0..64 {
        let client = client.clone();
        tasks.push(tokio::spawn(async move {
            client
                .send("get-user-profile", json!({}), CallOptions::new().max_attempts(1))
                .await
        }));
    }
    for task in tasks {
        assert!(task.await.unwrap().is_err());
    }

    assert_eq!(transport.calls(), 64);
    assert_eq!(client.breaker_state("get-user-profile").unwrap().failure_count, 64);
}
