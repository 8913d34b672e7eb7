//! The component security validator.
//!
//! Checks run in a fixed order and accumulate — callers always get the
//! complete report, never a short-circuited one:
//!
//! 1. signature presence/validity per policy
//! 2. checksum against the payload digest
//! 3. source domain trust
//! 4. payload size
//! 5. requested permissions against the policy sets
//! 6. risk-pattern scan over the payload
//! 7. quarantine check (the component itself and its dependencies)

use crate::policy::SecurityPolicy;
use crate::quarantine::QuarantineRegistry;
use crate::violation::{
    SecurityValidationResult, SecurityViolation, ViolationKind, ViolationSeverity,
};
use patchbay_crypto::{sha256_hex, verify_signature};
use patchbay_types::DynamicComponent;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::debug;

/// Metadata key carrying a component's requested permissions,
/// comma-separated.
const PERMISSIONS_METADATA_KEY: &str = "permissions";

/// Risk patterns scanned against the payload, each tagged with a severity.
/// Dynamic evaluation and process execution are treated as critical; raw
/// file access as an error; unscoped storage/network reach as a warning.
static RISK_PATTERNS: LazyLock<Vec<(Regex, ViolationSeverity, &'static str)>> =
    LazyLock::new(|| {
        [
            (r"\beval\s*\(", ViolationSeverity::Critical, "dynamic code evaluation"),
            (r"new\s+Function\s*\(", ViolationSeverity::Critical, "dynamic function construction"),
            (
                r"Runtime\.getRuntime\(\)\.exec|ProcessBuilder\s*\(",
                ViolationSeverity::Critical,
                "process execution",
            ),
            (r"child_process", ViolationSeverity::Error, "subprocess module"),
            (
                r#"java\.io\.File|require\(['"]fs['"]\)"#,
                ViolationSeverity::Error,
                "raw filesystem access",
            ),
            (
                r#"XMLHttpRequest|fetch\s*\(\s*['"]http://"#,
                ViolationSeverity::Warning,
                "unscoped network access",
            ),
            (
                r"localStorage|document\.cookie",
                ViolationSeverity::Warning,
                "unscoped storage access",
            ),
        ]
        .into_iter()
        .map(|(pattern, severity, label)| {
            (Regex::new(pattern).expect("static risk pattern"), severity, label)
        })
        .collect()
    });

/// Validates components against the configured policy and quarantine set.
pub struct SecurityValidator {
    policy: SecurityPolicy,
    quarantine: Arc<QuarantineRegistry>,
}

impl SecurityValidator {
    pub fn new(policy: SecurityPolicy, quarantine: Arc<QuarantineRegistry>) -> Self {
        Self { policy, quarantine }
    }

    /// The active policy.
    pub fn policy(&self) -> &SecurityPolicy {
        &self.policy
    }

    /// The quarantine registry backing check 7.
    pub fn quarantine(&self) -> &Arc<QuarantineRegistry> {
        &self.quarantine
    }

    /// Runs the full check sequence and returns the complete report.
    pub fn validate_component(&self, component: &DynamicComponent) -> SecurityValidationResult {
        let mut violations = Vec::new();

        self.check_signature(component, &mut violations);
        self.check_checksum(component, &mut violations);
        self.check_source(component, &mut violations);
        self.check_size(component, &mut violations);
        self.check_permissions(component, &mut violations);
        self.check_risk_patterns(component, &mut violations);
        self.check_quarantine(component, &mut violations);

        let result = SecurityValidationResult::from_violations(violations);
        debug!(
            component_id = %component.id,
            is_valid = result.is_valid,
            level = ?result.security_level,
            findings = result.violations.len(),
            "component validated"
        );
        result
    }

    fn check_signature(&self, component: &DynamicComponent, out: &mut Vec<SecurityViolation>) {
        if component.signature.is_empty() {
            if !self.policy.allow_unsigned_components {
                out.push(SecurityViolation::new(
                    ViolationKind::InvalidSignature,
                    ViolationSeverity::Critical,
                    format!("component '{}' is unsigned and policy requires signatures", component.id),
                ));
            }
        } else if !verify_signature(&self.policy.signing_key, &component.checksum, &component.signature) {
            out.push(SecurityViolation::new(
                ViolationKind::InvalidSignature,
                ViolationSeverity::Critical,
                format!("signature of component '{}' does not verify", component.id),
            ));
        }
    }

    fn check_checksum(&self, component: &DynamicComponent, out: &mut Vec<SecurityViolation>) {
        let computed = sha256_hex(&component.content);
        if computed != component.checksum {
            out.push(SecurityViolation::new(
                ViolationKind::ChecksumMismatch,
                ViolationSeverity::Critical,
                format!(
                    "checksum mismatch for '{}': declared {}, computed {}",
                    component.id, component.checksum, computed
                ),
            ));
        }
    }

    fn check_source(&self, component: &DynamicComponent, out: &mut Vec<SecurityViolation>) {
        if let Some(domain) = component.source_domain()
            && !self.policy.is_domain_trusted(domain)
        {
            out.push(SecurityViolation::new(
                ViolationKind::UntrustedSource,
                ViolationSeverity::Error,
                format!("source domain '{domain}' is not trusted"),
            ));
        }
    }

    fn check_size(&self, component: &DynamicComponent, out: &mut Vec<SecurityViolation>) {
        let size = component.content.len() as u64;
        if size > self.policy.max_payload_size {
            out.push(SecurityViolation::new(
                ViolationKind::OversizedPayload,
                ViolationSeverity::Error,
                format!(
                    "payload of {size} bytes exceeds the {} byte limit",
                    self.policy.max_payload_size
                ),
            ));
        }
    }

    fn check_permissions(&self, component: &DynamicComponent, out: &mut Vec<SecurityViolation>) {
        let Some(requested) = component.metadata.get(PERMISSIONS_METADATA_KEY) else {
            return;
        };
        for permission in requested.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if self.policy.blocked_permissions.contains(permission) {
                out.push(SecurityViolation::new(
                    ViolationKind::BlockedPermission,
                    ViolationSeverity::Critical,
                    format!("permission '{permission}' is blocked by policy"),
                ));
            } else if self.policy.dangerous_permissions.contains(permission) {
                out.push(SecurityViolation::new(
                    ViolationKind::DangerousPermission,
                    ViolationSeverity::Error,
                    format!("permission '{permission}' is dangerous"),
                ));
            } else if !self.policy.allowed_permissions.is_empty()
                && !self.policy.allowed_permissions.contains(permission)
            {
                out.push(SecurityViolation::new(
                    ViolationKind::UndeclaredPermission,
                    ViolationSeverity::Warning,
                    format!("permission '{permission}' is outside the allowed set"),
                ));
            }
        }
    }

    fn check_risk_patterns(&self, component: &DynamicComponent, out: &mut Vec<SecurityViolation>) {
        let text = String::from_utf8_lossy(&component.content);
        for (pattern, severity, label) in RISK_PATTERNS.iter() {
            if pattern.is_match(&text) {
                out.push(SecurityViolation::new(
                    ViolationKind::RiskyCodePattern,
                    *severity,
                    format!("payload contains {label}"),
                ));
            }
        }
    }

    fn check_quarantine(&self, component: &DynamicComponent, out: &mut Vec<SecurityViolation>) {
        if self.quarantine.is_quarantined(&component.id) {
            out.push(SecurityViolation::new(
                ViolationKind::QuarantinedDependency,
                ViolationSeverity::Critical,
                format!("component '{}' is quarantined", component.id),
            ));
        }
        for dep in &component.dependencies {
            if self.quarantine.is_quarantined(dep) {
                out.push(SecurityViolation::new(
                    ViolationKind::QuarantinedDependency,
                    ViolationSeverity::Critical,
                    format!("dependency '{dep}' is quarantined"),
                ));
            }
        }
    }
}
