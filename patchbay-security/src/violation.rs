//! Violation model and risk classification.

use serde::{Deserialize, Serialize};

/// Severity of a single violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationSeverity {
    Warning,
    Error,
    Critical,
}

/// What a violation is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationKind {
    InvalidSignature,
    ChecksumMismatch,
    UntrustedSource,
    OversizedPayload,
    BlockedPermission,
    DangerousPermission,
    UndeclaredPermission,
    RiskyCodePattern,
    QuarantinedDependency,
}

/// One finding from the validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityViolation {
    pub kind: ViolationKind,
    pub severity: ViolationSeverity,
    pub message: String,
}

impl SecurityViolation {
    pub fn new(kind: ViolationKind, severity: ViolationSeverity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
        }
    }
}

/// Coarse risk classification, monotonic in violation severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityLevel {
    Safe,
    LowRisk,
    MediumRisk,
    HighRisk,
    Dangerous,
}

impl SecurityLevel {
    /// Deterministic level from a violation set:
    /// any CRITICAL ⇒ Dangerous; >2 ERROR ⇒ HighRisk; ≥1 ERROR ⇒ MediumRisk;
    /// >3 WARNING ⇒ LowRisk; else Safe.
    #[must_use]
    pub fn from_violations(violations: &[SecurityViolation]) -> Self {
        let count = |s: ViolationSeverity| violations.iter().filter(|v| v.severity == s).count();

        if count(ViolationSeverity::Critical) > 0 {
            Self::Dangerous
        } else if count(ViolationSeverity::Error) > 2 {
            Self::HighRisk
        } else if count(ViolationSeverity::Error) >= 1 {
            Self::MediumRisk
        } else if count(ViolationSeverity::Warning) > 3 {
            Self::LowRisk
        } else {
            Self::Safe
        }
    }
}

/// Complete report for one validation call. Computed fresh each time,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityValidationResult {
    /// True iff no CRITICAL violation exists. ERROR/WARNING findings may
    /// still pass but are recorded.
    pub is_valid: bool,
    pub security_level: SecurityLevel,
    pub violations: Vec<SecurityViolation>,
    pub reason: String,
}

impl SecurityValidationResult {
    /// Builds a result from an accumulated violation list.
    #[must_use]
    pub fn from_violations(violations: Vec<SecurityViolation>) -> Self {
        let security_level = SecurityLevel::from_violations(&violations);
        let is_valid = !violations
            .iter()
            .any(|v| v.severity == ViolationSeverity::Critical);
        let reason = if violations.is_empty() {
            "no violations".to_string()
        } else {
            violations
                .iter()
                .map(|v| v.message.as_str())
                .collect::<Vec<_>>()
                .join("; ")
        };
        Self {
            is_valid,
            security_level,
            violations,
            reason,
        }
    }

    /// Violations of a given kind.
    pub fn of_kind(&self, kind: ViolationKind) -> impl Iterator<Item = &SecurityViolation> {
        self.violations.iter().filter(move |v| v.kind == kind)
    }
}
