//! Pure evaluation of trigger rules against a JSON context.
//!
//! No side effects, no errors: a rule that cannot be resolved (unknown
//! field, type mismatch, invalid regex) simply does not match.

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use talaria_core::{RuleCombinator, RuleExpr, RuleOperator};

/// Evaluate a rule set against the context.
///
/// Returns `true` iff the combinator is satisfied: every rule for
/// [`RuleCombinator::All`], at least one for [`RuleCombinator::Any`].
/// An empty rule set matches under `All` (nothing to violate) and does not
/// match under `Any`.
#[must_use]
pub fn evaluate_rules(rules: &[RuleExpr], combinator: RuleCombinator, context: &Value) -> bool {
    match combinator {
        RuleCombinator::All => rules.iter().all(|rule| evaluate_rule(rule, context)),
        RuleCombinator::Any => rules.iter().any(|rule| evaluate_rule(rule, context)),
    }
}

/// Evaluate one rule. Unknown fields evaluate to non-match.
#[must_use]
pub fn evaluate_rule(rule: &RuleExpr, context: &Value) -> bool {
    let field_value = lookup_path(context, &rule.field);

    if rule.operator == RuleOperator::Exists {
        return field_value.is_some_and(|v| !v.is_null());
    }

    let Some(field_value) = field_value else {
        debug!(field = %rule.field, "rule field not present in context");
        return false;
    };

    match rule.operator {
        RuleOperator::Equals => value_equals(field_value, &rule.value),
        RuleOperator::NotEquals => !value_equals(field_value, &rule.value),
        RuleOperator::Contains => value_contains(field_value, &rule.value),
        RuleOperator::NotContains => !value_contains(field_value, &rule.value),
        RuleOperator::StartsWith => both_strings(field_value, &rule.value)
            .is_some_and(|(field, value)| field.to_lowercase().starts_with(&value.to_lowercase())),
        RuleOperator::EndsWith => both_strings(field_value, &rule.value)
            .is_some_and(|(field, value)| field.to_lowercase().ends_with(&value.to_lowercase())),
        RuleOperator::GreaterThan => compare_numbers(field_value, &rule.value)
            .is_some_and(|(field, value)| field > value),
        RuleOperator::GreaterOrEqual => compare_numbers(field_value, &rule.value)
            .is_some_and(|(field, value)| field >= value),
        RuleOperator::LessThan => compare_numbers(field_value, &rule.value)
            .is_some_and(|(field, value)| field < value),
        RuleOperator::LessOrEqual => compare_numbers(field_value, &rule.value)
            .is_some_and(|(field, value)| field <= value),
        RuleOperator::Matches => regex_matches(field_value, &rule.value),
        RuleOperator::Exists => unreachable!("handled above"),
    }
}

/// Resolve a dotted path (`contact.tags`, `message`) into the context.
#[must_use]
pub fn lookup_path<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = context;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Case-insensitive string equality; strict JSON equality otherwise.
fn value_equals(field: &Value, value: &Value) -> bool {
    match (field, value) {
        (Value::String(a), Value::String(b)) => a.to_lowercase() == b.to_lowercase(),
        _ => field == value,
    }
}

/// Substring match for strings (case-insensitive), membership for arrays.
fn value_contains(field: &Value, value: &Value) -> bool {
    match field {
        Value::String(haystack) => value
            .as_str()
            .is_some_and(|needle| haystack.to_lowercase().contains(&needle.to_lowercase())),
        Value::Array(items) => items.iter().any(|item| value_equals(item, value)),
        _ => false,
    }
}

fn both_strings<'a>(field: &'a Value, value: &'a Value) -> Option<(&'a str, &'a str)> {
    Some((field.as_str()?, value.as_str()?))
}

/// Numeric comparison; numeric strings on the field side are coerced so
/// `"3" > 2` works for values arriving through webhook payloads.
fn compare_numbers(field: &Value, value: &Value) -> Option<(f64, f64)> {
    let field = field
        .as_f64()
        .or_else(|| field.as_str().and_then(|s| s.trim().parse().ok()))?;
    let value = value.as_f64()?;
    Some((field, value))
}

/// Regex match; an invalid pattern is a non-match, not an error.
fn regex_matches(field: &Value, value: &Value) -> bool {
    let (Some(text), Some(pattern)) = (field.as_str(), value.as_str()) else {
        return false;
    };
    match Regex::new(pattern) {
        Ok(re) => re.is_match(text),
        Err(_) => {
            debug!(pattern = %pattern, "invalid rule regex treated as non-match");
            false
        }
    }
}
