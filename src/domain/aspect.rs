use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectType {
    String,
    Ordinal,
    Numeric,
    Boolean,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AspectConstraint {
    /// Valid only for `AspectType::Ordinal`: the closed set of allowed values.
    Enum(Vec<String>),
    /// Valid only for `AspectType::Numeric`: an inclusive range.
    Range { min: f64, max: f64 },
    /// Valid only for `AspectType::String`: a maximum length.
    MaxLength(usize),
}

/// Definition of an aspect key that scopes may attach values to (spec §3).
/// Deletion is forbidden while any live scope references the key — enforced
/// by the Cross-Aggregate Validator, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AspectDefinition {
    pub key: String,
    pub aspect_type: AspectType,
    pub allow_multiple: bool,
    pub constraints: Vec<AspectConstraint>,
}

impl AspectDefinition {
    pub fn validate_value(&self, value: &AspectValue) -> Result<(), String> {
        match (self.aspect_type, value) {
            (AspectType::String, AspectValue::String(s)) => {
                for constraint in &self.constraints {
                    if let AspectConstraint::MaxLength(max) = constraint {
                        if s.chars().count() > *max {
                            return Err(format!("value exceeds max length {}", max));
                        }
                    }
                }
                Ok(())
            }
            (AspectType::Ordinal, AspectValue::Ordinal(s)) => {
                for constraint in &self.constraints {
                    if let AspectConstraint::Enum(allowed) = constraint {
                        if !allowed.contains(s) {
                            return Err(format!("'{}' is not one of {:?}", s, allowed));
                        }
                    }
                }
                Ok(())
            }
            (AspectType::Numeric, AspectValue::Numeric(n)) => {
                for constraint in &self.constraints {
                    if let AspectConstraint::Range { min, max } = constraint {
                        if n < min || n > max {
                            return Err(format!("{} is outside range [{}, {}]", n, min, max));
                        }
                    }
                }
                Ok(())
            }
            (AspectType::Boolean, AspectValue::Boolean(_)) => Ok(()),
            _ => Err("aspect value does not match the aspect definition's type".to_string()),
        }
    }
}

/// A value stored against an aspect key on a scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AspectValue {
    String(String),
    Ordinal(String),
    Numeric(f64),
    Boolean(bool),
}
