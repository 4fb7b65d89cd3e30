#![allow(clippy::unwrap_used)]
// End-to-end tests for the generation correlator: dispatch over a mocked
// HTTP backend, result delivery over a loopback push connection, and a
// paused tokio clock for the deadline.

use std::time::Duration;

use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use corral_api::ApiClient;
use corral_api::push::{LoopbackDriver, PushCommand, PushHandle};
use corral_core::{CoreError, await_generation_with_timeout};

const TIMEOUT: Duration = Duration::from_millis(180_000);

// ── Helpers ─────────────────────────────────────────────────────────

async fn backend_with_task_id(task_id: &str) -> (MockServer, ApiClient) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rules/gen_rules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "task_id": task_id })))
        .mount(&server)
        .await;
    let client = ApiClient::with_client(reqwest::Client::new(), Url::parse(&server.uri()).unwrap());
    (server, client)
}

fn result_payload() -> serde_json::Value {
    json!({
        "hasResults": true,
        "summery": "one noisy cluster",
        "results": [{
            "ShortRuleName": "db pressure",
            "CELRule": "service == \"db\"",
            "Timeframe": 30,
            "GroupBy": ["labels.host"],
            "ChainOfThought": "db alerts fire together",
            "WhyTooGeneral": "",
            "WhyTooSpecific": "",
            "Score": 70
        }]
    })
}

/// Spin until the correlator's subscribe frame shows up, then hand the
/// channel name back.
async fn wait_for_subscribe(driver: &mut LoopbackDriver) -> String {
    loop {
        if let Some(cmd) = driver.try_next_command() {
            match cmd {
                PushCommand::Subscribe(channel) => return channel,
                PushCommand::Unsubscribe(channel) => panic!("unexpected unsubscribe of {channel}"),
            }
        }
        tokio::task::yield_now().await;
    }
}

// ── Resolution via event ────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn result_event_resolves_with_payload() {
    let (_server, api) = backend_with_task_id("t-42").await;
    let (push, mut driver) = PushHandle::loopback();

    let (result, channel) = tokio::join!(
        await_generation_with_timeout(&api, &push, TIMEOUT),
        async {
            let channel = wait_for_subscribe(&mut driver).await;
            assert_eq!(channel, "gen_rules_t-42");
            driver.deliver(&channel, "result", result_payload());
            channel
        }
    );

    let report = result.unwrap();
    assert_eq!(report.summary.as_deref(), Some("one noisy cluster"));
    assert_eq!(report.suggestions.len(), 1);
    assert_eq!(report.suggestions[0].short_name, "db pressure");

    // Exactly one unsubscribe for the one subscribe.
    assert_eq!(
        driver.try_next_command(),
        Some(PushCommand::Unsubscribe(channel))
    );
    assert_eq!(driver.try_next_command(), None);

    // Fast-forward well past the deadline: the settled operation must
    // produce no late effects.
    tokio::time::advance(TIMEOUT + Duration::from_secs(1)).await;
    assert_eq!(driver.try_next_command(), None);
}

#[tokio::test(start_paused = true)]
async fn duplicate_result_delivery_has_no_effect() {
    let (_server, api) = backend_with_task_id("t-dup").await;
    let (push, mut driver) = PushHandle::loopback();

    let (result, _) = tokio::join!(
        await_generation_with_timeout(&api, &push, TIMEOUT),
        async {
            let channel = wait_for_subscribe(&mut driver).await;
            driver.deliver(&channel, "result", result_payload());
            driver.deliver(&channel, "result", result_payload());
        }
    );

    result.unwrap();

    // One subscribe already consumed; the duplicate delivery must not
    // cause a second unsubscribe.
    assert_eq!(
        driver.try_next_command(),
        Some(PushCommand::Unsubscribe("gen_rules_t-dup".into()))
    );
    assert_eq!(driver.try_next_command(), None);
}

// ── Resolution via timeout ──────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn timeout_rejects_distinctly_and_unsubscribes_once() {
    let (_server, api) = backend_with_task_id("t-slow").await;
    let (push, mut driver) = PushHandle::loopback();

    // No event is ever delivered; the paused clock auto-advances to the
    // deadline.
    let result = await_generation_with_timeout(&api, &push, TIMEOUT).await;

    match result {
        Err(CoreError::ResultTimeout { timeout_secs }) => assert_eq!(timeout_secs, 180),
        other => panic!("expected ResultTimeout, got: {other:?}"),
    }

    assert_eq!(
        driver.try_next_command(),
        Some(PushCommand::Subscribe("gen_rules_t-slow".into()))
    );
    assert_eq!(
        driver.try_next_command(),
        Some(PushCommand::Unsubscribe("gen_rules_t-slow".into()))
    );
    assert_eq!(driver.try_next_command(), None);
}

// ── Dispatch failures ───────────────────────────────────────────────

#[tokio::test]
async fn dispatch_failure_never_subscribes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rules/gen_rules"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({ "detail": "overloaded" })))
        .mount(&server)
        .await;
    let api = ApiClient::with_client(reqwest::Client::new(), Url::parse(&server.uri()).unwrap());
    let (push, mut driver) = PushHandle::loopback();

    let result = await_generation_with_timeout(&api, &push, TIMEOUT).await;

    match result {
        Err(CoreError::Dispatch { ref message }) => assert!(message.contains("overloaded")),
        other => panic!("expected Dispatch, got: {other:?}"),
    }
    assert_eq!(driver.try_next_command(), None);
}

#[tokio::test]
async fn missing_task_id_fails_fast_without_subscribing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rules/gen_rules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;
    let api = ApiClient::with_client(reqwest::Client::new(), Url::parse(&server.uri()).unwrap());
    let (push, mut driver) = PushHandle::loopback();

    let result = await_generation_with_timeout(&api, &push, TIMEOUT).await;

    assert!(
        matches!(result, Err(CoreError::Dispatch { .. })),
        "got: {result:?}"
    );
    assert_eq!(driver.try_next_command(), None);
}

// ── Backend-signalled failure ───────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn error_payload_is_a_generation_error() {
    let (_server, api) = backend_with_task_id("t-err").await;
    let (push, mut driver) = PushHandle::loopback();

    let (result, _) = tokio::join!(
        await_generation_with_timeout(&api, &push, TIMEOUT),
        async {
            let channel = wait_for_subscribe(&mut driver).await;
            driver.deliver(&channel, "result", json!({ "error": "model unavailable" }));
        }
    );

    match result {
        Err(CoreError::Generation { ref message }) => assert_eq!(message, "model unavailable"),
        other => panic!("expected Generation, got: {other:?}"),
    }

    // Failure path still unsubscribes exactly once.
    assert_eq!(
        driver.try_next_command(),
        Some(PushCommand::Unsubscribe("gen_rules_t-err".into()))
    );
    assert_eq!(driver.try_next_command(), None);
}

// ── Caller abandonment ──────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn abandoned_operation_unsubscribes_on_drop() {
    let (_server, api) = backend_with_task_id("t-gone").await;
    let (push, mut driver) = PushHandle::loopback();

    let mut operation = Box::pin(await_generation_with_timeout(&api, &push, TIMEOUT));

    // Drive the operation just far enough to subscribe.
    let channel = loop {
        tokio::select! {
            biased;
            result = &mut operation => panic!("operation should still be pending: {result:?}"),
            () = tokio::task::yield_now() => {}
        }
        if let Some(PushCommand::Subscribe(channel)) = driver.try_next_command() {
            break channel;
        }
    };

    // Caller tears down before either outcome: the subscription must be
    // released and the timer goes with the dropped future.
    drop(operation);

    assert_eq!(
        driver.try_next_command(),
        Some(PushCommand::Unsubscribe(channel))
    );
    assert_eq!(driver.try_next_command(), None);
}
