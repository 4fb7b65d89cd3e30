//! Suggestion submission tracking.
//!
//! Each suggestion (keyed by its short name) moves through
//! `Idle -> Loading -> {Added | Idle}`. `Loading -> Added` is terminal:
//! re-submitting an added suggestion is refused, which is what makes a
//! re-click after success a no-op. `Loading -> Idle` happens on failure
//! and leaves the suggestion eligible for a user-initiated retry --
//! there is no automatic retry. Failures are scoped to their key; other
//! suggestions' states are never touched.

use dashmap::DashMap;
use tracing::{error, info};

use corral_api::ApiClient;
use corral_api::models::{RuleCreateBody, SqlQuery};

use crate::error::CoreError;
use crate::model::{Rule, RuleSuggestion};

/// Placeholder SQL definition the creation endpoint still requires.
/// The backend correlates on the CEL text; the SQL fields are vestigial.
pub(crate) fn placeholder_sql() -> SqlQuery {
    SqlQuery {
        sql: "{new-version-not-adding-this}".into(),
        params: serde_json::json!(["no-params"]),
    }
}

/// Submission state of one suggestion key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubmissionState {
    #[default]
    Idle,
    Loading,
    Added,
}

/// Tracks per-suggestion submission state across a batch.
///
/// Safe to share between concurrent callers: the `Idle -> Loading`
/// transition is atomic per key, so the same suggestion can never be
/// double-submitted.
#[derive(Default)]
pub struct SuggestionTracker {
    states: DashMap<String, SubmissionState>,
}

impl SuggestionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state for a suggestion key. Unknown keys are `Idle`.
    pub fn state(&self, key: &str) -> SubmissionState {
        self.states.get(key).map(|s| *s).unwrap_or_default()
    }

    pub fn is_added(&self, key: &str) -> bool {
        self.state(key) == SubmissionState::Added
    }

    /// Persist a suggestion as a correlation rule.
    ///
    /// The mapping into the creation shape follows the backend contract
    /// for accepted suggestions: the suggestion's native timeframe value
    /// goes into `timeframeInSeconds` with the unit fixed to `minutes`,
    /// the SQL fields carry the placeholder, and approval is not
    /// required.
    pub async fn submit(
        &self,
        api: &ApiClient,
        suggestion: &RuleSuggestion,
    ) -> Result<Rule, CoreError> {
        let key = suggestion.short_name.clone();

        // Atomic Idle -> Loading gate.
        {
            let mut entry = self.states.entry(key.clone()).or_default();
            match *entry {
                SubmissionState::Idle => *entry = SubmissionState::Loading,
                SubmissionState::Loading => {
                    return Err(CoreError::SubmissionInFlight {
                        name: key,
                        state: "being submitted",
                    });
                }
                SubmissionState::Added => {
                    return Err(CoreError::SubmissionInFlight {
                        name: key,
                        state: "added",
                    });
                }
            }
        }

        match api.create_rule(&creation_body(suggestion)).await {
            Ok(record) => {
                self.states.insert(key.clone(), SubmissionState::Added);
                info!(suggestion = %key, "suggestion added as rule");
                Ok(Rule::from(record))
            }
            Err(e) => {
                error!(suggestion = %key, error = %e, "failed to add suggestion");
                self.states.insert(key.clone(), SubmissionState::Idle);
                Err(CoreError::Submission {
                    name: key,
                    message: e.to_string(),
                })
            }
        }
    }
}

/// Map a suggestion into the rule-creation shape.
pub fn creation_body(suggestion: &RuleSuggestion) -> RuleCreateBody {
    RuleCreateBody {
        rule_name: suggestion.short_name.clone(),
        sql_query: placeholder_sql(),
        cel_query: suggestion.cel_rule.clone(),
        timeframe_in_seconds: suggestion.timeframe_minutes,
        time_unit: "minutes".into(),
        grouping_criteria: suggestion.group_by.clone(),
        group_description: Some(suggestion.chain_of_thought.clone()),
        require_approve: false,
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

    fn suggestion(name: &str) -> RuleSuggestion {
        RuleSuggestion {
            short_name: name.into(),
            cel_rule: "service == \"db\"".into(),
            timeframe_minutes: 30,
            group_by: vec!["labels.host".into()],
            chain_of_thought: "db alerts fire together".into(),
            why_too_general: String::new(),
            why_too_specific: String::new(),
            score: 70,
        }
    }

    async fn setup() -> (MockServer, ApiClient) {
        let server = MockServer::start().await;
        let client =
            ApiClient::with_client(reqwest::Client::new(), Url::parse(&server.uri()).unwrap());
        (server, client)
    }

    fn created_rule_json(name: &str) -> serde_json::Value {
        json!({
            "id": "r-new",
            "name": name,
            "definition_cel": "service == \"db\"",
            "timeframe": 30,
            "timeunit": "minutes"
        })
    }

    #[test]
    fn creation_body_mapping() {
        let body = creation_body(&suggestion("db pressure"));
        assert_eq!(body.rule_name, "db pressure");
        assert_eq!(body.sql_query.sql, "{new-version-not-adding-this}");
        assert_eq!(body.sql_query.params, json!(["no-params"]));
        assert_eq!(body.timeframe_in_seconds, 30);
        assert_eq!(body.time_unit, "minutes");
        assert_eq!(body.group_description.as_deref(), Some("db alerts fire together"));
        assert!(!body.require_approve);
    }

    #[tokio::test]
    async fn successful_submit_is_terminal() {
        let (server, api) = setup().await;
        Mock::given(method("POST"))
            .and(path("/rules"))
            .respond_with(ResponseTemplate::new(200).set_body_json(created_rule_json("db pressure")))
            .expect(1)
            .mount(&server)
            .await;

        let tracker = SuggestionTracker::new();
        let s = suggestion("db pressure");

        assert_eq!(tracker.state("db pressure"), SubmissionState::Idle);
        let rule = tracker.submit(&api, &s).await.unwrap();
        assert_eq!(rule.id, "r-new");
        assert!(tracker.is_added("db pressure"));

        // Re-clicking after success is not re-submitted.
        let err = tracker.submit(&api, &s).await.unwrap_err();
        assert!(matches!(err, CoreError::SubmissionInFlight { state: "added", .. }));
    }

    #[tokio::test]
    async fn failed_submit_returns_to_idle_and_allows_retry() {
        let (server, api) = setup().await;
        Mock::given(method("POST"))
            .and(path("/rules"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(json!({ "detail": "db unavailable" })),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rules"))
            .respond_with(ResponseTemplate::new(200).set_body_json(created_rule_json("db pressure")))
            .mount(&server)
            .await;

        let tracker = SuggestionTracker::new();
        let s = suggestion("db pressure");

        let err = tracker.submit(&api, &s).await.unwrap_err();
        assert!(matches!(err, CoreError::Submission { .. }), "got: {err:?}");
        assert_eq!(tracker.state("db pressure"), SubmissionState::Idle);

        // User-initiated retry succeeds.
        tracker.submit(&api, &s).await.unwrap();
        assert!(tracker.is_added("db pressure"));
    }

    #[tokio::test]
    async fn failures_are_scoped_to_their_key() {
        let (server, api) = setup().await;
        Mock::given(method("POST"))
            .and(path("/rules"))
            .respond_with(ResponseTemplate::new(200).set_body_json(created_rule_json("good")))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rules"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "detail": "bad CEL" })))
            .mount(&server)
            .await;

        let tracker = SuggestionTracker::new();
        tracker.submit(&api, &suggestion("good")).await.unwrap();
        let _ = tracker.submit(&api, &suggestion("bad")).await;

        assert!(tracker.is_added("good"));
        assert_eq!(tracker.state("bad"), SubmissionState::Idle);
    }
}
