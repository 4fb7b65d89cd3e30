//! Wire types for the rules API.
//!
//! These mirror the backend's JSON shapes exactly and stay raw -- no unit
//! conversion, no CEL parsing. `corral-core` converts them into domain
//! types.

use serde::{Deserialize, Serialize};

// ── Persisted rules ──────────────────────────────────────────────────

/// A persisted correlation rule as returned by `GET /rules`.
///
/// Uses `#[serde(flatten)]` to capture fields beyond the core set, so
/// nothing the backend sends is silently dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleRecord {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub item_description: Option<String>,

    #[serde(default)]
    pub group_description: Option<String>,

    /// Ordered attribute paths the rule groups by.
    #[serde(default)]
    pub grouping_criteria: Vec<String>,

    /// CEL text of the matching condition. Semantically equivalent to
    /// the structured `definition`.
    pub definition_cel: String,

    #[serde(default)]
    pub definition: SqlQuery,

    /// Timeframe in canonical seconds.
    pub timeframe: u64,

    /// Display unit: `"seconds"`, `"minutes"`, `"hours"`, or `"days"`.
    #[serde(default)]
    pub timeunit: Option<String>,

    #[serde(default)]
    pub created_by: Option<String>,

    /// ISO-8601 creation timestamp, as sent by the backend.
    #[serde(default)]
    pub creation_time: Option<String>,

    #[serde(default)]
    pub tenant_id: Option<String>,

    #[serde(default)]
    pub updated_by: Option<String>,

    #[serde(default)]
    pub update_time: Option<String>,

    #[serde(default)]
    pub require_approve: bool,

    /// Resolution policy: `"all_resolved"`, `"first_resolved"`,
    /// `"last_resolved"`, or `"never"`.
    #[serde(default)]
    pub resolve_on: Option<String>,

    /// Alert-count histogram: group key -> timestamp bucket -> count.
    #[serde(default)]
    pub distribution: std::collections::HashMap<String, std::collections::HashMap<String, u64>>,

    /// Number of incidents this rule has produced.
    #[serde(default)]
    pub incidents: u64,

    /// All remaining fields the backend sends.
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

/// The structured SQL definition stored alongside the CEL text.
///
/// `params` is a map for rules persisted by older backends and a list
/// for rules created through the current creation path, so it stays an
/// opaque `Value`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SqlQuery {
    #[serde(default)]
    pub sql: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

// ── Rule creation ────────────────────────────────────────────────────

/// Request body for `POST /rules` and `PUT /rules/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCreateBody {
    pub rule_name: String,
    pub sql_query: SqlQuery,
    pub cel_query: String,
    pub timeframe_in_seconds: u64,
    pub time_unit: String,
    #[serde(default)]
    pub grouping_criteria: Vec<String>,
    #[serde(default)]
    pub group_description: Option<String>,
    #[serde(default)]
    pub require_approve: bool,
}

// ── Generation ───────────────────────────────────────────────────────

/// Response of `GET /rules/gen_rules`: the correlation token linking the
/// dispatched request to its eventual push-channel result.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationTask {
    #[serde(default)]
    pub task_id: String,
}

impl GenerationTask {
    /// Channel the result for this task will be pushed on.
    pub fn channel(&self) -> String {
        format!("gen_rules_{}", self.task_id)
    }
}

/// A batch of generated rule suggestions, as delivered over the push
/// channel (and, historically, inline from the dispatch endpoint).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuggestionBatch {
    #[serde(default, rename = "hasResults")]
    pub has_results: bool,

    #[serde(default)]
    pub results: Vec<RawSuggestion>,

    // The backend misspells "summary" on the wire; keep the wire name.
    #[serde(default, rename = "summery")]
    pub summary: Option<String>,

    /// Set when the generation run itself failed server-side.
    #[serde(default)]
    pub error: Option<String>,
}

/// One AI-suggested rule. Field names are PascalCase on the wire -- the
/// backend passes the model's function-call output through unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSuggestion {
    #[serde(rename = "ShortRuleName")]
    pub short_rule_name: String,

    #[serde(rename = "CELRule")]
    pub cel_rule: String,

    /// Time window in minutes, as produced by the generator.
    #[serde(rename = "Timeframe")]
    pub timeframe: u64,

    #[serde(rename = "GroupBy", default)]
    pub group_by: Vec<String>,

    #[serde(rename = "ChainOfThought", default)]
    pub chain_of_thought: String,

    #[serde(rename = "WhyTooGeneral", default)]
    pub why_too_general: String,

    #[serde(rename = "WhyTooSpecific", default)]
    pub why_too_specific: String,

    /// 1-100 confidence score.
    #[serde(rename = "Score", default)]
    pub score: u32,
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_rule_record() {
        let json = serde_json::json!({
            "id": "r-1",
            "name": "cpu storms",
            "definition_cel": "severity == \"critical\"",
            "definition": { "sql": "SELECT 1", "params": {} },
            "timeframe": 600,
            "timeunit": "minutes",
            "grouping_criteria": ["labels.cluster"],
            "created_by": "ops@example.com",
            "creation_time": "2026-01-12T09:00:00Z",
            "require_approve": true,
            "resolve_on": "all_resolved",
            "distribution": { "cluster-a": { "1736672400": 3 } },
            "incidents": 7,
            "some_future_field": "ignored-but-kept"
        });

        let rule: RuleRecord = serde_json::from_value(json).unwrap();
        assert_eq!(rule.id, "r-1");
        assert_eq!(rule.timeframe, 600);
        assert_eq!(rule.timeunit.as_deref(), Some("minutes"));
        assert_eq!(rule.grouping_criteria, vec!["labels.cluster"]);
        assert_eq!(rule.distribution["cluster-a"]["1736672400"], 3);
        assert_eq!(rule.incidents, 7);
        // Unknown fields land in `extra`
        assert_eq!(rule.extra["some_future_field"], "ignored-but-kept");
    }

    #[test]
    fn rule_create_body_uses_camel_case() {
        let body = RuleCreateBody {
            rule_name: "db-errors".into(),
            sql_query: SqlQuery {
                sql: "{new-version-not-adding-this}".into(),
                params: serde_json::json!(["no-params"]),
            },
            cel_query: "service == \"db\"".into(),
            timeframe_in_seconds: 15,
            time_unit: "minutes".into(),
            grouping_criteria: vec!["labels.host".into()],
            group_description: Some("why".into()),
            require_approve: false,
        };

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["ruleName"], "db-errors");
        assert_eq!(value["celQuery"], "service == \"db\"");
        assert_eq!(value["timeframeInSeconds"], 15);
        assert_eq!(value["timeUnit"], "minutes");
        assert_eq!(value["sqlQuery"]["params"][0], "no-params");
        assert_eq!(value["requireApprove"], false);
    }

    #[test]
    fn suggestion_batch_wire_names() {
        let json = serde_json::json!({
            "hasResults": true,
            "summery": "two clusters of related alerts",
            "results": [{
                "ShortRuleName": "k8s pod pressure",
                "CELRule": "labels.alertname.contains(\"Pod\")",
                "Timeframe": 30,
                "GroupBy": ["labels.namespace"],
                "ChainOfThought": "pods fail together",
                "WhyTooGeneral": "matches all pod alerts",
                "WhyTooSpecific": "misses node alerts",
                "Score": 82
            }]
        });

        let batch: SuggestionBatch = serde_json::from_value(json).unwrap();
        assert!(batch.has_results);
        assert_eq!(batch.summary.as_deref(), Some("two clusters of related alerts"));
        assert_eq!(batch.results.len(), 1);
        let s = &batch.results[0];
        assert_eq!(s.short_rule_name, "k8s pod pressure");
        assert_eq!(s.timeframe, 30);
        assert_eq!(s.score, 82);
    }

    #[test]
    fn generation_task_channel_name() {
        let task: GenerationTask =
            serde_json::from_value(serde_json::json!({ "task_id": "abc123" })).unwrap();
        assert_eq!(task.channel(), "gen_rules_abc123");
    }

    #[test]
    fn generation_task_tolerates_missing_id() {
        // The caller is responsible for rejecting the empty id -- see
        // `ApiClient::trigger_generation`.
        let task: GenerationTask = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(task.task_id.is_empty());
    }
}
