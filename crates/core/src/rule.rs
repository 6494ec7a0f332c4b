use serde::{Deserialize, Serialize};

/// Comparison operator of a trigger rule.
///
/// String comparisons for `Equals`/`Contains` are case-insensitive: rule
/// values are matched against chat text typed by humans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum RuleOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    /// Field is present and non-null in the context.
    Exists,
    /// Regular-expression match; an invalid pattern is a non-match.
    Matches,
}

/// A single trigger condition against the evaluation context.
///
/// `field` is a dotted path into the flattened context (`contact.name`,
/// `message`). Unknown fields evaluate to non-match rather than erroring.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RuleExpr {
    pub field: String,
    pub operator: RuleOperator,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub value: serde_json::Value,
}

impl RuleExpr {
    #[must_use]
    pub fn new(
        field: impl Into<String>,
        operator: RuleOperator,
        value: serde_json::Value,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }
}

/// How the rules of a trigger combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum RuleCombinator {
    /// Every rule must match (AND).
    #[default]
    All,
    /// At least one rule must match (OR).
    Any,
}
