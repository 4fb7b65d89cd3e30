// ── Reactive rule store ──
//
// Holds the last-fetched rules list and pushes change notification to
// subscribers via a `watch` channel. `refresh` is the revalidation hook:
// callers re-run it after any mutation (create, update, delete,
// suggestion accepted).

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;
use tracing::debug;

use corral_api::ApiClient;

use crate::error::CoreError;
use crate::model::Rule;

/// A lock-free, reactive collection of persisted rules.
///
/// Uses `DashMap` for O(1) concurrent lookups and `watch` channels for
/// push-based change notification. Every refresh bumps a version
/// counter and rebuilds the snapshot subscribers receive.
pub struct RuleStore {
    by_id: DashMap<String, Arc<Rule>>,
    version: watch::Sender<u64>,
    snapshot: watch::Sender<Arc<Vec<Arc<Rule>>>>,
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleStore {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            by_id: DashMap::new(),
            version,
            snapshot,
        }
    }

    /// Fetch the rules list and replace the store's contents.
    ///
    /// Returns the number of rules now held.
    pub async fn refresh(&self, api: &ApiClient) -> Result<usize, CoreError> {
        let records = api.list_rules().await?;
        let rules: Vec<Arc<Rule>> = records.into_iter().map(Rule::from).map(Arc::new).collect();

        self.by_id.clear();
        for rule in &rules {
            self.by_id.insert(rule.id.clone(), Arc::clone(rule));
        }

        self.rebuild_snapshot();
        self.version.send_modify(|v| *v += 1);

        debug!(rules = self.by_id.len(), "rule store refreshed");
        Ok(self.by_id.len())
    }

    /// Look up a rule by id.
    pub fn get(&self, id: &str) -> Option<Arc<Rule>> {
        self.by_id.get(id).map(|r| Arc::clone(r.value()))
    }

    /// Look up a rule by id or, failing that, by exact name.
    pub fn find(&self, identifier: &str) -> Option<Arc<Rule>> {
        self.get(identifier).or_else(|| {
            self.by_id
                .iter()
                .find(|r| r.value().name == identifier)
                .map(|r| Arc::clone(r.value()))
        })
    }

    /// Get the current snapshot, sorted by rule name (cheap `Arc` clone).
    pub fn snapshot(&self) -> Arc<Vec<Arc<Rule>>> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes via a `watch::Receiver`.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<Rule>>>> {
        self.snapshot.subscribe()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Collect all values into a name-sorted snapshot and broadcast it.
    fn rebuild_snapshot(&self) {
        let mut values: Vec<Arc<Rule>> = self
            .by_id
            .iter()
            .map(|r| Arc::clone(r.value()))
            .collect();
        values.sort_by(|a, b| a.name.cmp(&b.name));
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn rule_json(id: &str, name: &str) -> serde_json::Value {
        json!({
            "id": id,
            "name": name,
            "definition_cel": "service == \"db\"",
            "timeframe": 600,
            "timeunit": "minutes"
        })
    }

    async fn server_with_rules(rules: serde_json::Value) -> (MockServer, ApiClient) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rules"))
            .respond_with(ResponseTemplate::new(200).set_body_json(rules))
            .mount(&server)
            .await;
        let client =
            ApiClient::with_client(reqwest::Client::new(), Url::parse(&server.uri()).unwrap());
        (server, client)
    }

    #[tokio::test]
    async fn refresh_replaces_contents_and_sorts_snapshot() {
        let (_server, api) =
            server_with_rules(json!([rule_json("r-2", "zz storms"), rule_json("r-1", "aa errors")]))
                .await;

        let store = RuleStore::new();
        assert!(store.is_empty());

        let count = store.refresh(&api).await.unwrap();
        assert_eq!(count, 2);

        let snap = store.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].name, "aa errors");
        assert_eq!(snap[1].name, "zz storms");

        assert_eq!(store.get("r-1").unwrap().name, "aa errors");
        assert_eq!(store.find("zz storms").unwrap().id, "r-2");
        assert!(store.find("missing").is_none());
    }

    #[tokio::test]
    async fn refresh_notifies_subscribers() {
        let (_server, api) = server_with_rules(json!([rule_json("r-1", "aa errors")])).await;

        let store = RuleStore::new();
        let mut rx = store.subscribe();
        assert!(rx.borrow().is_empty());

        store.refresh(&api).await.unwrap();

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().len(), 1);
    }
}
