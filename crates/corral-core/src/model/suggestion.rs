// ── AI-generated rule suggestions ──

use serde::{Deserialize, Serialize};

/// One candidate rule produced by a generation run.
///
/// A value object within its batch: identity is the short name, which is
/// also the key submission state is tracked under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSuggestion {
    /// Short display name (also the submission key).
    pub short_name: String,

    /// CEL text of the suggested matching condition.
    pub cel_rule: String,

    /// Suggested time window, in minutes (the generator's native unit).
    pub timeframe_minutes: u64,

    /// Attribute paths to group by.
    pub group_by: Vec<String>,

    /// The generator's reasoning for this rule.
    pub chain_of_thought: String,

    /// Devil's-advocate argument that the rule is too broad.
    pub why_too_general: String,

    /// Devil's-advocate argument that the rule is too narrow.
    pub why_too_specific: String,

    /// 1-100 confidence score.
    pub score: u32,
}

/// A full generation result: batch summary plus the suggestions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuggestionReport {
    pub summary: Option<String>,
    pub suggestions: Vec<RuleSuggestion>,
}

impl SuggestionReport {
    /// True when the batch carries no suggestions. Shared-feed consumers
    /// skip empty deliveries.
    pub fn is_empty(&self) -> bool {
        self.suggestions.is_empty()
    }
}
