//! Per-task generation correlator.
//!
//! Bridges the backend's asynchronous rule-generation run to a caller
//! awaiting its result: dispatch the request, subscribe to the
//! task-scoped push channel, and settle on the first of {result event,
//! deadline}. Cleanup is guaranteed -- the channel is unsubscribed
//! exactly once whether the event arrives, the deadline fires, or the
//! caller abandons the operation early.

use std::time::Duration;

use tracing::{debug, warn};

use corral_api::ApiClient;
use corral_api::push::PushHandle;

use crate::convert::decode_generation_payload;
use crate::error::CoreError;
use crate::model::SuggestionReport;

/// How long to wait for the pushed result before giving up.
pub const DEFAULT_RESULT_TIMEOUT: Duration = Duration::from_millis(180_000);

/// Event name the backend publishes results under.
pub const RESULT_EVENT: &str = "result";

/// Run a generation request end to end with the default deadline.
pub async fn await_generation(
    api: &ApiClient,
    push: &PushHandle,
) -> Result<SuggestionReport, CoreError> {
    await_generation_with_timeout(api, push, DEFAULT_RESULT_TIMEOUT).await
}

/// Run a generation request end to end.
///
/// 1. Dispatch `GET /rules/gen_rules`; any failure (including a missing
///    task id) surfaces as [`CoreError::Dispatch`] without opening a
///    subscription. Dispatch is never retried internally.
/// 2. Subscribe to `gen_rules_{task_id}`.
/// 3. Wait for the first `result` event on that channel or for the
///    deadline, whichever comes first. Only the winner takes effect:
///    the loser's unsubscribe collapses into the idempotent
///    [`unsubscribe`](corral_api::push::Subscription::unsubscribe), and
///    duplicate event deliveries after settlement are ignored because
///    the future has already completed.
/// 4. The payload is validated at the boundary: a backend-signalled
///    failure or an undecodable payload becomes
///    [`CoreError::Generation`].
///
/// Dropping the returned future before it settles unsubscribes via the
/// subscription's `Drop` impl and discards the deadline timer with the
/// future, so abandonment leaks neither.
pub async fn await_generation_with_timeout(
    api: &ApiClient,
    push: &PushHandle,
    timeout: Duration,
) -> Result<SuggestionReport, CoreError> {
    let task = api
        .trigger_generation()
        .await
        .map_err(|e| CoreError::Dispatch {
            message: e.to_string(),
        })?;

    // Subscribe before waiting -- fast backends can answer within the
    // same tick as the dispatch response.
    let mut subscription = push.subscribe(&task.channel());
    debug!(channel = %subscription.channel(), "subscribed, awaiting generation result");

    let outcome = tokio::select! {
        event = subscription.next_event(RESULT_EVENT) => match event {
            Some(event) => decode_generation_payload(&event.data),
            None => Err(CoreError::PushChannelClosed),
        },
        () = tokio::time::sleep(timeout) => {
            warn!(
                channel = %subscription.channel(),
                timeout_secs = timeout.as_secs(),
                "no generation result before deadline"
            );
            Err(CoreError::ResultTimeout {
                timeout_secs: timeout.as_secs(),
            })
        }
    };

    subscription.unsubscribe();
    outcome
}
