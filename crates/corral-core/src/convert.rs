// ── Wire → domain conversions ──
//
// Lenient by design: a single rule with an unknown timeunit or resolve
// policy must not fail the whole list, so unknown strings fall back to
// the documented defaults.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use tracing::debug;

use corral_api::models::{RawSuggestion, RuleRecord, SuggestionBatch};

use crate::error::CoreError;
use crate::model::{ResolvePolicy, Rule, RuleSuggestion, SqlDefinition, SuggestionReport, TimeUnit};

impl From<RuleRecord> for Rule {
    fn from(raw: RuleRecord) -> Self {
        let timeunit = raw
            .timeunit
            .as_deref()
            .map(|s| {
                TimeUnit::from_str(s).unwrap_or_else(|_| {
                    debug!(timeunit = s, "unknown timeunit, defaulting to seconds");
                    TimeUnit::Seconds
                })
            })
            .unwrap_or_default();

        let resolve_on = raw
            .resolve_on
            .as_deref()
            .map(|s| {
                ResolvePolicy::from_str(s).unwrap_or_else(|_| {
                    debug!(resolve_on = s, "unknown resolve policy, defaulting to never");
                    ResolvePolicy::Never
                })
            })
            .unwrap_or_default();

        Self {
            id: raw.id,
            name: raw.name,
            item_description: raw.item_description,
            group_description: raw.group_description,
            grouping_criteria: raw.grouping_criteria,
            definition_cel: raw.definition_cel,
            definition: SqlDefinition {
                sql: raw.definition.sql,
                params: raw.definition.params,
            },
            timeframe_secs: raw.timeframe,
            timeunit,
            created_by: raw.created_by,
            creation_time: parse_timestamp(raw.creation_time.as_deref()),
            updated_by: raw.updated_by,
            update_time: parse_timestamp(raw.update_time.as_deref()),
            require_approve: raw.require_approve,
            resolve_on,
            distribution: raw.distribution,
            incidents: raw.incidents,
        }
    }
}

impl From<RawSuggestion> for RuleSuggestion {
    fn from(raw: RawSuggestion) -> Self {
        Self {
            short_name: raw.short_rule_name,
            cel_rule: raw.cel_rule,
            timeframe_minutes: raw.timeframe,
            group_by: raw.group_by,
            chain_of_thought: raw.chain_of_thought,
            why_too_general: raw.why_too_general,
            why_too_specific: raw.why_too_specific,
            score: raw.score,
        }
    }
}

impl From<SuggestionBatch> for SuggestionReport {
    fn from(batch: SuggestionBatch) -> Self {
        Self {
            summary: batch.summary,
            suggestions: batch.results.into_iter().map(RuleSuggestion::from).collect(),
        }
    }
}

/// Decode a push-channel payload into a suggestion report.
///
/// The payload is validated at the boundary rather than passed through:
/// an `{"error": ...}` payload and an undecodable payload both surface
/// as [`CoreError::Generation`].
pub fn decode_generation_payload(data: &serde_json::Value) -> Result<SuggestionReport, CoreError> {
    let batch: SuggestionBatch =
        serde_json::from_value(data.clone()).map_err(|e| CoreError::Generation {
            message: format!("unexpected result payload: {e}"),
        })?;

    if let Some(message) = batch.error {
        return Err(CoreError::Generation { message });
    }

    Ok(SuggestionReport {
        summary: batch.summary,
        suggestions: batch.results.into_iter().map(RuleSuggestion::from).collect(),
    })
}

/// Parse an ISO-8601 timestamp the backend sent, tolerating both
/// offset-carrying and naive-UTC forms.
fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let s = raw?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Older backends emit naive timestamps without an offset.
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
