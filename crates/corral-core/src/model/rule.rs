// ── Correlation rule domain type ──

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Alert-count histogram: group key -> timestamp bucket -> count.
pub type Distribution = HashMap<String, HashMap<String, u64>>;

/// The display unit for a rule's timeframe.
///
/// The timeframe itself is always stored in canonical seconds; the unit
/// only governs presentation. Conversion back to seconds before
/// persisting is the caller's responsibility (see
/// [`CorrelationForm`](crate::form::CorrelationForm)).
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TimeUnit {
    #[default]
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Seconds per unit: 1, 60, 3600, 86400.
    pub fn secs(self) -> u64 {
        match self {
            Self::Seconds => 1,
            Self::Minutes => 60,
            Self::Hours => 3600,
            Self::Days => 86400,
        }
    }

    /// The UI-facing amount for a canonical-seconds timeframe.
    ///
    /// `3600s` displayed in hours is `1`; `90s` displayed in seconds is
    /// `90`.
    #[allow(clippy::cast_precision_loss)]
    pub fn display_amount(self, timeframe_secs: u64) -> f64 {
        timeframe_secs as f64 / self.secs() as f64
    }

    /// Convert a UI-facing amount back to canonical seconds.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_seconds(self, amount: f64) -> u64 {
        (amount * self.secs() as f64).round().max(0.0) as u64
    }
}

/// When a grouped incident is considered resolved.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResolvePolicy {
    /// Resolve when every grouped alert has resolved.
    AllResolved,
    /// Resolve when the first grouped alert resolves.
    FirstResolved,
    /// Resolve when the last-received alert resolves.
    LastResolved,
    /// Never auto-resolve.
    #[default]
    Never,
}

/// The structured SQL rendering of a rule's condition, stored alongside
/// the CEL text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SqlDefinition {
    pub sql: String,
    pub params: serde_json::Value,
}

/// A persisted correlation rule.
///
/// The invariant tying the fields together: `definition_cel` and the
/// structured query tree derived from it (see
/// [`cel::parse`](crate::cel::parse)) are semantically equivalent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub item_description: Option<String>,
    pub group_description: Option<String>,

    /// Ordered attribute paths alerts are grouped by.
    pub grouping_criteria: Vec<String>,

    /// CEL text of the matching condition.
    pub definition_cel: String,

    pub definition: SqlDefinition,

    /// Timeframe in canonical seconds.
    pub timeframe_secs: u64,

    /// Display unit for the timeframe.
    pub timeunit: TimeUnit,

    pub created_by: Option<String>,
    pub creation_time: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
    pub update_time: Option<DateTime<Utc>>,

    /// Whether a grouped incident requires operator approval before it
    /// opens.
    pub require_approve: bool,

    pub resolve_on: ResolvePolicy,

    pub distribution: Distribution,

    /// Number of incidents this rule has produced.
    pub incidents: u64,
}

impl Rule {
    /// The timeframe expressed in this rule's display unit.
    pub fn display_timeframe(&self) -> f64 {
        self.timeunit.display_amount(self.timeframe_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_seconds_table() {
        assert_eq!(TimeUnit::Seconds.secs(), 1);
        assert_eq!(TimeUnit::Minutes.secs(), 60);
        assert_eq!(TimeUnit::Hours.secs(), 3600);
        assert_eq!(TimeUnit::Days.secs(), 86400);
    }

    #[test]
    fn display_amount_divides_by_unit() {
        assert!((TimeUnit::Hours.display_amount(3600) - 1.0).abs() < f64::EPSILON);
        assert!((TimeUnit::Seconds.display_amount(90) - 90.0).abs() < f64::EPSILON);
        assert!((TimeUnit::Minutes.display_amount(90) - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn to_seconds_round_trips() {
        assert_eq!(TimeUnit::Minutes.to_seconds(5.0), 300);
        assert_eq!(TimeUnit::Days.to_seconds(1.0), 86400);
        assert_eq!(TimeUnit::Minutes.to_seconds(1.5), 90);
    }

    #[test]
    fn units_parse_from_wire_names() {
        use std::str::FromStr;
        assert_eq!(TimeUnit::from_str("hours").ok(), Some(TimeUnit::Hours));
        assert_eq!(
            ResolvePolicy::from_str("all_resolved").ok(),
            Some(ResolvePolicy::AllResolved)
        );
    }
}
