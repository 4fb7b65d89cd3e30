// ── Domain model ──

pub mod rule;
pub mod suggestion;

pub use rule::{Distribution, ResolvePolicy, Rule, SqlDefinition, TimeUnit};
pub use suggestion::{RuleSuggestion, SuggestionReport};
