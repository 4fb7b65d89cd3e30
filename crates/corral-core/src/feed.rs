//! Shared suggestion feed.
//!
//! The simpler sibling of the per-task correlator: one long-lived
//! subscription on a well-known channel, shared by every consumer.
//! There is no per-request subscribe/unsubscribe and no timeout;
//! [`request_refresh`](SuggestionFeed::request_refresh) merely prompts
//! the backend, and whatever batch eventually materialises reaches all
//! currently bound consumers.
//!
//! The feed is an explicitly owned object injected into consumers --
//! never an implicit process-wide singleton. Its lifecycle is "open at
//! first use, closed at teardown" via [`dispose`](SuggestionFeed::dispose)
//! (or drop).

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, trace};

use corral_api::ApiClient;
use corral_api::push::{PushEvent, PushHandle, Subscription};

use crate::convert::decode_generation_payload;
use crate::error::CoreError;
use crate::model::SuggestionReport;

/// Channel all generation batches are published on.
pub const SHARED_CHANNEL: &str = "ai-rules";

/// Event name for freshly generated suggestion batches.
pub const BATCH_EVENT: &str = "rules-aigen-created";

/// A long-lived binding to the shared suggestion channel.
pub struct SuggestionFeed {
    subscription: Subscription,
    events: broadcast::Receiver<Arc<PushEvent>>,
}

impl SuggestionFeed {
    /// Subscribe the shared channel on an existing push connection.
    pub fn new(push: &PushHandle) -> Self {
        let subscription = push.subscribe(SHARED_CHANNEL);
        debug!(channel = SHARED_CHANNEL, "shared suggestion feed opened");
        Self {
            subscription,
            events: push.events(),
        }
    }

    /// Register a consumer.
    ///
    /// Every binding independently receives every delivery (fan-out,
    /// not a shared queue); dropping one binding never affects another
    /// binding's deliveries. Bindings are keyed by receiver instance,
    /// not by event name.
    pub fn bind(&self) -> FeedBinding {
        FeedBinding {
            events: self.events.resubscribe(),
        }
    }

    /// Prompt the backend to generate a fresh batch.
    ///
    /// Fire-and-forget: the dispatch response is not consumed, and
    /// there is deliberately no correlation between a given trigger and
    /// a given later delivery -- two triggers issued close together
    /// produce deliveries that cannot be told apart. Callers that need
    /// a correlated, bounded wait use
    /// [`await_generation`](crate::correlator::await_generation) instead.
    pub async fn request_refresh(&self, api: &ApiClient) -> Result<(), CoreError> {
        api.trigger_generation_detached()
            .await
            .map_err(|e| CoreError::Dispatch {
                message: e.to_string(),
            })
    }

    /// Unsubscribe the shared channel. Idempotent; also runs on drop.
    pub fn dispose(&mut self) {
        self.subscription.unsubscribe();
    }
}

/// One consumer's registration on the shared feed.
pub struct FeedBinding {
    events: broadcast::Receiver<Arc<PushEvent>>,
}

impl FeedBinding {
    /// Wait for the next non-empty suggestion batch.
    ///
    /// Deliveries whose batch decodes to an empty suggestion list are
    /// skipped, as are frames on other channels or with other event
    /// names. Returns `None` once the push connection is gone.
    pub async fn next_batch(&mut self) -> Option<Result<SuggestionReport, CoreError>> {
        loop {
            match self.events.recv().await {
                Ok(event) => {
                    if event.channel.as_deref() != Some(SHARED_CHANNEL)
                        || event.event != BATCH_EVENT
                    {
                        continue;
                    }
                    match decode_generation_payload(&event.data) {
                        Ok(report) if report.is_empty() => {
                            trace!("ignoring empty suggestion batch");
                        }
                        other => return Some(other),
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "suggestion feed lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use corral_api::push::PushCommand;

    fn batch_payload(names: &[&str]) -> serde_json::Value {
        serde_json::json!({
            "hasResults": !names.is_empty(),
            "results": names
                .iter()
                .map(|name| {
                    serde_json::json!({
                        "ShortRuleName": name,
                        "CELRule": "service == \"db\"",
                        "Timeframe": 10,
                        "Score": 50
                    })
                })
                .collect::<Vec<_>>()
        })
    }

    #[test]
    fn feed_subscribes_shared_channel_once() {
        let (push, mut driver) = PushHandle::loopback();
        let feed = SuggestionFeed::new(&push);
        let _a = feed.bind();
        let _b = feed.bind();

        assert_eq!(
            driver.try_next_command(),
            Some(PushCommand::Subscribe(SHARED_CHANNEL.into()))
        );
        // Bindings never open their own channel subscriptions.
        assert_eq!(driver.try_next_command(), None);
    }

    #[test]
    fn dispose_unsubscribes_idempotently() {
        let (push, mut driver) = PushHandle::loopback();
        let mut feed = SuggestionFeed::new(&push);
        let _ = driver.try_next_command();

        feed.dispose();
        feed.dispose();
        drop(feed);

        assert_eq!(
            driver.try_next_command(),
            Some(PushCommand::Unsubscribe(SHARED_CHANNEL.into()))
        );
        assert_eq!(driver.try_next_command(), None);
    }

    #[tokio::test]
    async fn every_binding_sees_every_batch() {
        let (push, driver) = PushHandle::loopback();
        let feed = SuggestionFeed::new(&push);
        let mut first = feed.bind();
        let mut second = feed.bind();

        driver.deliver(SHARED_CHANNEL, BATCH_EVENT, batch_payload(&["db pressure"]));

        let a = first.next_batch().await.unwrap().unwrap();
        let b = second.next_batch().await.unwrap().unwrap();
        assert_eq!(a.suggestions[0].short_name, "db pressure");
        assert_eq!(b.suggestions[0].short_name, "db pressure");
    }

    #[tokio::test]
    async fn dropping_one_binding_leaves_others_active() {
        let (push, driver) = PushHandle::loopback();
        let feed = SuggestionFeed::new(&push);
        let first = feed.bind();
        let mut second = feed.bind();

        drop(first);
        driver.deliver(SHARED_CHANNEL, BATCH_EVENT, batch_payload(&["still here"]));

        let report = second.next_batch().await.unwrap().unwrap();
        assert_eq!(report.suggestions[0].short_name, "still here");
    }

    #[tokio::test]
    async fn empty_batches_are_skipped() {
        let (push, driver) = PushHandle::loopback();
        let feed = SuggestionFeed::new(&push);
        let mut binding = feed.bind();

        driver.deliver(SHARED_CHANNEL, BATCH_EVENT, batch_payload(&[]));
        driver.deliver(SHARED_CHANNEL, "unrelated-event", batch_payload(&["x"]));
        driver.deliver(SHARED_CHANNEL, BATCH_EVENT, batch_payload(&["real batch"]));

        let report = binding.next_batch().await.unwrap().unwrap();
        assert_eq!(report.suggestions[0].short_name, "real batch");
    }
}
