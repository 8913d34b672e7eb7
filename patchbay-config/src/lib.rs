//! Typed configuration for Patchbay.
//!
//! - `ConfigValue` — closed union replacing stringly-typed settings
//! - `ValidationRule` — accumulating rule engine with named custom predicates
//! - `DynamicConfiguration` — checksummed document with category/scope/priority
//! - `ConfigManager` — persistence, merge semantics, change-event fan-out

mod configuration;
mod error;
mod events;
mod manager;
mod rules;
mod value;

pub use configuration::{ConfigScope, DynamicConfiguration};
pub use error::{ConfigError, ConfigResult};
pub use events::{ConfigChangeEvent, ConfigChangeKind, KeyEvents};
pub use manager::ConfigManager;
pub use rules::{
    validate_values, CustomPredicate, CustomRuleSet, RuleKind, ValidationReport, ValidationRule,
};
pub use value::ConfigValue;
