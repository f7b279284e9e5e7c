//! Tenant-defined filter predicates over event data.
//!
//! A filter spec is written by tenants as a flat JSON mapping: keys suffixed
//! `_min`/`_max` express inclusive numeric range bounds against the
//! like-named data field, array values express set membership, scalars exact
//! equality. [`FilterSpec::parse`] turns that mapping into typed
//! [`FilterExpr`] constraints exactly once, at the validation boundary;
//! evaluation interprets the typed expressions and never inspects key
//! suffixes.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::WebhookError;

/// A single typed constraint against one event data field.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    /// The field must equal this value exactly.
    Exact(Value),
    /// The field must be numeric and fall within the inclusive bounds.
    Range { min: Option<f64>, max: Option<f64> },
    /// The field must be one of these values.
    In(Vec<Value>),
}

impl FilterExpr {
    fn matches(&self, actual: Option<&Value>) -> bool {
        match self {
            Self::Exact(expected) => actual == Some(expected),
            Self::Range { min, max } => {
                let Some(n) = actual.and_then(Value::as_f64) else {
                    return false;
                };
                min.map_or(true, |m| n >= m) && max.map_or(true, |m| n <= m)
            }
            Self::In(allowed) => actual.map_or(false, |v| allowed.contains(v)),
        }
    }
}

/// A conjunction of typed constraints, keyed by data field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    exprs: BTreeMap<String, FilterExpr>,
}

impl FilterSpec {
    /// Parse a tenant-facing filter mapping into typed expressions.
    ///
    /// `_min`/`_max` suffixed keys merge into a [`FilterExpr::Range`] on the
    /// base field name. Null constraints are ignored. A key that would
    /// combine a range bound with a non-range constraint on the same field
    /// is rejected, as are non-scalar, non-array constraint values.
    pub fn parse(value: &Value) -> Result<Self, WebhookError> {
        let Some(map) = value.as_object() else {
            return Err(WebhookError::Validation(
                "Filter spec must be a JSON object".to_string(),
            ));
        };

        let mut exprs: BTreeMap<String, FilterExpr> = BTreeMap::new();

        for (raw_key, constraint) in map {
            if constraint.is_null() {
                continue;
            }

            if let Some(field) = raw_key.strip_suffix("_min") {
                let bound = numeric_bound(raw_key, constraint)?;
                set_range_bound(&mut exprs, field, raw_key, Some(bound), None)?;
                continue;
            }

            if let Some(field) = raw_key.strip_suffix("_max") {
                let bound = numeric_bound(raw_key, constraint)?;
                set_range_bound(&mut exprs, field, raw_key, None, Some(bound))?;
                continue;
            }

            let expr = match constraint {
                Value::Array(allowed) => FilterExpr::In(allowed.clone()),
                Value::String(_) | Value::Number(_) | Value::Bool(_) => {
                    FilterExpr::Exact(constraint.clone())
                }
                _ => {
                    return Err(WebhookError::Validation(format!(
                        "Unsupported filter constraint for key '{raw_key}'"
                    )));
                }
            };

            if exprs.insert(raw_key.clone(), expr).is_some() {
                return Err(WebhookError::Validation(format!(
                    "Conflicting filter constraints for field '{raw_key}'"
                )));
            }
        }

        Ok(Self { exprs })
    }

    /// Evaluate the spec against event data. Every constraint must hold.
    /// An empty spec always matches.
    #[must_use]
    pub fn matches(&self, data: &Value) -> bool {
        self.exprs
            .iter()
            .all(|(field, expr)| expr.matches(data.get(field)))
    }

    /// True when the spec carries no constraints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    /// The typed constraint on a field, if any.
    #[must_use]
    pub fn constraint(&self, field: &str) -> Option<&FilterExpr> {
        self.exprs.get(field)
    }
}

fn numeric_bound(raw_key: &str, constraint: &Value) -> Result<f64, WebhookError> {
    constraint.as_f64().ok_or_else(|| {
        WebhookError::Validation(format!("Range bound '{raw_key}' must be numeric"))
    })
}

fn set_range_bound(
    exprs: &mut BTreeMap<String, FilterExpr>,
    field: &str,
    raw_key: &str,
    min: Option<f64>,
    max: Option<f64>,
) -> Result<(), WebhookError> {
    match exprs.get_mut(field) {
        None => {
            exprs.insert(field.to_string(), FilterExpr::Range { min, max });
            Ok(())
        }
        Some(FilterExpr::Range {
            min: existing_min,
            max: existing_max,
        }) => {
            if min.is_some() {
                *existing_min = min;
            }
            if max.is_some() {
                *existing_max = max;
            }
            Ok(())
        }
        Some(_) => Err(WebhookError::Validation(format!(
            "Conflicting filter constraints for field '{field}' (from '{raw_key}')"
        ))),
    }
}
