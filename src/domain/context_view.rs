use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::aspect::AspectValue;

pub type AspectMap = HashMap<String, Vec<AspectValue>>;

/// A saved filter expression over aspects (spec §3 Context View, glossary).
/// Read-side only: evaluating a filter never mutates scopes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterExpression {
    HasAspect { key: String },
    Equals { key: String, value: AspectValue },
    Contains { key: String, substring: String },
    And(Vec<FilterExpression>),
    Or(Vec<FilterExpression>),
    Not(Box<FilterExpression>),
}

impl FilterExpression {
    pub fn evaluate(&self, aspects: &AspectMap) -> bool {
        match self {
            FilterExpression::HasAspect { key } => aspects.get(key).is_some_and(|v| !v.is_empty()),
            FilterExpression::Equals { key, value } => aspects
                .get(key)
                .is_some_and(|values| values.contains(value)),
            FilterExpression::Contains { key, substring } => {
                aspects.get(key).is_some_and(|values| {
                    values.iter().any(|v| match v {
                        AspectValue::String(s) => s.contains(substring.as_str()),
                        AspectValue::Ordinal(s) => s.contains(substring.as_str()),
                        _ => false,
                    })
                })
            }
            FilterExpression::And(parts) => parts.iter().all(|p| p.evaluate(aspects)),
            FilterExpression::Or(parts) => parts.iter().any(|p| p.evaluate(aspects)),
            FilterExpression::Not(inner) => !inner.evaluate(aspects),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextView {
    pub key: String,
    pub name: String,
    pub filter: FilterExpression,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aspects(pairs: &[(&str, AspectValue)]) -> AspectMap {
        let mut map = AspectMap::new();
        for (k, v) in pairs {
            map.entry(k.to_string()).or_default().push(v.clone());
        }
        map
    }

    #[test]
    fn has_aspect_and_equals() {
        let a = aspects(&[("priority", AspectValue::Ordinal("high".into()))]);
        assert!(FilterExpression::HasAspect {
            key: "priority".into()
        }
        .evaluate(&a));
        assert!(FilterExpression::Equals {
            key: "priority".into(),
            value: AspectValue::Ordinal("high".into())
        }
        .evaluate(&a));
        assert!(!FilterExpression::Equals {
            key: "priority".into(),
            value: AspectValue::Ordinal("low".into())
        }
        .evaluate(&a));
    }

    #[test]
    fn boolean_combinators() {
        let a = aspects(&[
            ("priority", AspectValue::Ordinal("high".into())),
            ("notes", AspectValue::String("needs review".into())),
        ]);
        let expr = FilterExpression::And(vec![
            FilterExpression::Equals {
                key: "priority".into(),
                value: AspectValue::Ordinal("high".into()),
            },
            FilterExpression::Contains {
                key: "notes".into(),
                substring: "review".into(),
            },
        ]);
        assert!(expr.evaluate(&a));
        assert!(FilterExpression::Not(Box::new(expr.clone())).evaluate(&a) == false);
    }
}
