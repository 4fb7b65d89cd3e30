//! Correlation form state.
//!
//! The authoring-side view of a rule: what the sidebar form edits. A
//! form is derived from a persisted rule for editing (pre-population)
//! and converted back into the creation shape for persisting. The
//! timeframe is handled in display units here; canonical seconds exist
//! only on the wire and in [`Rule`].

use serde::{Deserialize, Serialize};

use corral_api::models::RuleCreateBody;

use crate::cel::{self, RuleGroup, RuleNode};
use crate::error::CoreError;
use crate::model::{ResolvePolicy, Rule, TimeUnit};
use crate::submit::placeholder_sql;

/// Editable form state for one correlation rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationForm {
    pub name: String,
    pub description: String,

    /// Timeframe amount in `time_unit`s (not seconds).
    pub time_amount: f64,
    pub time_unit: TimeUnit,

    pub grouped_attributes: Vec<String>,
    pub require_approve: bool,
    pub resolve_on: ResolvePolicy,

    /// The query-builder tree. Children of the top-level group are
    /// themselves groups -- see [`RuleGroup::into_form_group`].
    pub query: RuleGroup,

    pub incidents: u64,
}

impl Default for CorrelationForm {
    /// The blank form: a 5-minute timeframe and one empty `and` group.
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            time_amount: 5.0,
            time_unit: TimeUnit::Minutes,
            grouped_attributes: Vec::new(),
            require_approve: false,
            resolve_on: ResolvePolicy::Never,
            query: RuleGroup {
                combinator: cel::Combinator::And,
                rules: vec![RuleNode::Group(RuleGroup::empty_and())],
            },
            incidents: 0,
        }
    }
}

impl CorrelationForm {
    /// Pre-populate the form from a persisted rule.
    ///
    /// Parses `definition_cel` into the query tree (wrapping flat
    /// parses in a single `and` group) and converts the canonical
    /// timeframe into the rule's display unit.
    pub fn from_rule(rule: &Rule) -> Result<Self, CoreError> {
        let query = cel::parse(&rule.definition_cel)?.into_form_group();

        Ok(Self {
            name: rule.name.clone(),
            description: rule.group_description.clone().unwrap_or_default(),
            time_amount: rule.timeunit.display_amount(rule.timeframe_secs),
            time_unit: rule.timeunit,
            grouped_attributes: rule.grouping_criteria.clone(),
            require_approve: rule.require_approve,
            resolve_on: rule.resolve_on,
            query,
            incidents: rule.incidents,
        })
    }

    /// Convert the form back into the creation shape.
    ///
    /// The CEL text is rendered from the query tree and the timeframe
    /// converted back to canonical seconds -- that conversion is this
    /// method's responsibility, not the caller's.
    pub fn to_create_body(&self) -> RuleCreateBody {
        RuleCreateBody {
            rule_name: self.name.clone(),
            sql_query: placeholder_sql(),
            cel_query: self.query.to_string(),
            timeframe_in_seconds: self.time_unit.to_seconds(self.time_amount),
            time_unit: self.time_unit.to_string(),
            grouping_criteria: self.grouped_attributes.clone(),
            group_description: if self.description.is_empty() {
                None
            } else {
                Some(self.description.clone())
            },
            require_approve: self.require_approve,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
