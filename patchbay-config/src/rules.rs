//! Validation rules for configuration values.
//!
//! Every rule is evaluated — errors accumulate rather than failing fast, so
//! a caller sees the complete report in one pass. Rules bound to a field
//! that is absent (other than `Required`) produce a warning, not an error.

use crate::value::ConfigValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Predicate backing a `Custom` rule, registered by name.
pub type CustomPredicate = Arc<dyn Fn(&ConfigValue) -> bool + Send + Sync>;

/// Named custom predicates. Rules referencing an unregistered name warn
/// instead of erroring, so a stale rule never blocks a save.
#[derive(Default, Clone)]
pub struct CustomRuleSet {
    predicates: BTreeMap<String, CustomPredicate>,
}

impl CustomRuleSet {
    pub fn register(&mut self, name: impl Into<String>, predicate: CustomPredicate) {
        self.predicates.insert(name.into(), predicate);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CustomPredicate> {
        self.predicates.get(name)
    }
}

impl fmt::Debug for CustomRuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomRuleSet")
            .field("names", &self.predicates.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// What a rule checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleKind {
    Required,
    MinLength { min: usize },
    MaxLength { max: usize },
    /// Inclusive numeric bounds.
    Range { min: f64, max: f64 },
    Regex { pattern: String },
    Enum { allowed: Vec<String> },
    /// Resolved against the registered custom predicate table.
    Custom { name: String },
}

/// A rule bound to one configuration field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    pub field: String,
    #[serde(flatten)]
    pub kind: RuleKind,
}

impl ValidationRule {
    pub fn new(field: impl Into<String>, kind: RuleKind) -> Self {
        Self {
            field: field.into(),
            kind,
        }
    }

    pub fn required(field: impl Into<String>) -> Self {
        Self::new(field, RuleKind::Required)
    }
}

/// Accumulated validation outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Evaluates every rule against the value map, accumulating errors and
/// warnings.
pub fn validate_values(
    values: &BTreeMap<String, ConfigValue>,
    rules: &[ValidationRule],
    custom: &CustomRuleSet,
) -> ValidationReport {
    let mut report = ValidationReport::default();

    for rule in rules {
        let value = values.get(&rule.field);

        if let RuleKind::Required = rule.kind {
            if value.is_none() {
                report
                    .errors
                    .push(format!("required field '{}' is missing", rule.field));
            }
            continue;
        }

        // Non-required rules bound to an absent field are a schema smell,
        // not a data error.
        let Some(value) = value else {
            report.warnings.push(format!(
                "rule on '{}' references a field that is not set",
                rule.field
            ));
            continue;
        };

        match &rule.kind {
            RuleKind::Required => unreachable!("handled above"),
            RuleKind::MinLength { min } => match value.len() {
                Some(len) if len < *min => report.errors.push(format!(
                    "field '{}' is too short: {len} < {min}",
                    rule.field
                )),
                Some(_) => {}
                None => report.errors.push(format!(
                    "field '{}' has no length ({})",
                    rule.field,
                    value.type_name()
                )),
            },
            RuleKind::MaxLength { max } => match value.len() {
                Some(len) if len > *max => report.errors.push(format!(
                    "field '{}' is too long: {len} > {max}",
                    rule.field
                )),
                Some(_) => {}
                None => report.errors.push(format!(
                    "field '{}' has no length ({})",
                    rule.field,
                    value.type_name()
                )),
            },
            RuleKind::Range { min, max } => match value.as_f64() {
                Some(n) if n < *min || n > *max => report.errors.push(format!(
                    "field '{}' out of range: {n} not in [{min}, {max}]",
                    rule.field
                )),
                Some(_) => {}
                None => report.errors.push(format!(
                    "field '{}' is not numeric ({})",
                    rule.field,
                    value.type_name()
                )),
            },
            RuleKind::Regex { pattern } => match regex::Regex::new(pattern) {
                Ok(re) => match value.as_str() {
                    Some(s) if re.is_match(s) => {}
                    Some(_) => report.errors.push(format!(
                        "field '{}' does not match pattern '{pattern}'",
                        rule.field
                    )),
                    None => report.errors.push(format!(
                        "field '{}' is not a string ({})",
                        rule.field,
                        value.type_name()
                    )),
                },
                Err(_) => report.warnings.push(format!(
                    "rule on '{}' carries an invalid pattern '{pattern}'",
                    rule.field
                )),
            },
            RuleKind::Enum { allowed } => match value.as_str() {
                Some(s) if allowed.iter().any(|a| a == s) => {}
                Some(s) => report.errors.push(format!(
                    "field '{}' value '{s}' is not one of {allowed:?}",
                    rule.field
                )),
                None => report.errors.push(format!(
                    "field '{}' is not a string ({})",
                    rule.field,
                    value.type_name()
                )),
            },
            RuleKind::Custom { name } => match custom.get(name) {
                Some(predicate) if predicate(value) => {}
                Some(_) => report
                    .errors
                    .push(format!("field '{}' rejected by rule '{name}'", rule.field)),
                None => report
                    .warnings
                    .push(format!("custom rule '{name}' is not registered")),
            },
        }
    }

    report
}
