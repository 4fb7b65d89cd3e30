//! CEL-like boolean rule expressions.
//!
//! A rule's matching condition exists in two equivalent forms: the CEL
//! text persisted with the rule (`definition_cel`) and the structured
//! query-builder tree the sidebar form edits. This module holds the tree
//! types, the parser from text to tree ([`parse`]), and rendering back
//! to text (`Display`). The serde shape of the tree matches the
//! query-builder convention: groups are `{combinator, rules}` objects,
//! leaf conditions are `{field, operator, value}` objects.

mod parser;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use parser::parse;

// ── Tree types ───────────────────────────────────────────────────────

/// How a group combines its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    And,
    Or,
}

/// A group node: a combinator over an ordered list of children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleGroup {
    pub combinator: Combinator,
    pub rules: Vec<RuleNode>,
}

/// A child of a group: either a nested group or a leaf condition.
///
/// Untagged so the serialized tree reads exactly like query-builder
/// JSON -- a child is a group iff it has a `combinator` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleNode {
    Group(RuleGroup),
    Condition(Condition),
}

/// A leaf condition: `field operator value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Dotted attribute path, e.g. `labels.alertname`.
    pub field: String,
    pub operator: CelOp,
    pub value: CelValue,
}

/// Comparison operators. Serde names follow the query-builder
/// convention; CEL rendering lives in `Display for Condition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CelOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "beginsWith")]
    StartsWith,
    #[serde(rename = "endsWith")]
    EndsWith,
    #[serde(rename = "in")]
    In,
}

/// A literal value in a condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CelValue {
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
    List(Vec<CelValue>),
}

// ── Form-group wrapping ──────────────────────────────────────────────

impl RuleGroup {
    /// Prepare a parsed tree for the sidebar form.
    ///
    /// The form expects the top-level group's children to be groups. If
    /// any direct child already is a combinator node the tree is left
    /// untouched; otherwise all children are wrapped in a single `and`
    /// group.
    pub fn into_form_group(self) -> RuleGroup {
        let any_combinator = self
            .rules
            .iter()
            .any(|rule| matches!(rule, RuleNode::Group(_)));

        if any_combinator {
            return self;
        }

        RuleGroup {
            combinator: self.combinator,
            rules: vec![RuleNode::Group(RuleGroup {
                combinator: Combinator::And,
                rules: self.rules,
            })],
        }
    }

    /// An empty `and` group -- the default form query.
    pub fn empty_and() -> Self {
        Self {
            combinator: Combinator::And,
            rules: Vec::new(),
        }
    }
}

// ── Rendering back to CEL text ───────────────────────────────────────

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "&&"),
            Self::Or => write!(f, "||"),
        }
    }
}

impl fmt::Display for RuleGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, rule) in self.rules.iter().enumerate() {
            if i > 0 {
                write!(f, " {} ", self.combinator)?;
            }
            match rule {
                RuleNode::Condition(cond) => write!(f, "{cond}")?,
                RuleNode::Group(group) => write!(f, "({group})")?,
            }
        }
        Ok(())
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operator {
            CelOp::Contains => write!(f, "{}.contains({})", self.field, self.value),
            CelOp::StartsWith => write!(f, "{}.startsWith({})", self.field, self.value),
            CelOp::EndsWith => write!(f, "{}.endsWith({})", self.field, self.value),
            CelOp::In => write!(f, "{} in {}", self.field, self.value),
            CelOp::Eq => write!(f, "{} == {}", self.field, self.value),
            CelOp::Ne => write!(f, "{} != {}", self.field, self.value),
            CelOp::Gt => write!(f, "{} > {}", self.field, self.value),
            CelOp::Ge => write!(f, "{} >= {}", self.field, self.value),
            CelOp::Lt => write!(f, "{} < {}", self.field, self.value),
            CelOp::Le => write!(f, "{} <= {}", self.field, self.value),
        }
    }
}

impl fmt::Display for CelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            Self::Num(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            Self::Bool(b) => write!(f, "{b}"),
            Self::Null => write!(f, "null"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
