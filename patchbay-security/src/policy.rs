//! Security policy — what the validator enforces.
//!
//! Policy is loadable from a TOML file with fall-back-to-default-and-warn
//! semantics, so a malformed file never bricks the engine.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{info, warn};

/// Default maximum payload size: 10 MiB.
const DEFAULT_MAX_PAYLOAD_SIZE: u64 = 10 * 1024 * 1024;

/// Validation policy for incoming components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityPolicy {
    /// When false, components with an empty signature fail with a
    /// CRITICAL violation.
    #[serde(default)]
    pub allow_unsigned_components: bool,
    /// Shared signing key used to verify descriptor signatures.
    #[serde(default)]
    pub signing_key: String,
    /// Maximum accepted payload size in bytes.
    #[serde(default = "default_max_payload_size")]
    pub max_payload_size: u64,
    /// Allow-list of source domains. Takes precedence over the block-list;
    /// when both are empty, every source is allowed.
    #[serde(default)]
    pub trusted_domains: Vec<String>,
    /// Block-list of source domains.
    #[serde(default)]
    pub blocked_domains: Vec<String>,
    /// Permissions a component may request. Empty means "no restriction".
    #[serde(default)]
    pub allowed_permissions: HashSet<String>,
    /// Permissions that always fail validation.
    #[serde(default = "default_blocked_permissions")]
    pub blocked_permissions: HashSet<String>,
    /// Permissions that are accepted but flagged.
    #[serde(default = "default_dangerous_permissions")]
    pub dangerous_permissions: HashSet<String>,
}

fn default_max_payload_size() -> u64 {
    DEFAULT_MAX_PAYLOAD_SIZE
}

fn default_blocked_permissions() -> HashSet<String> {
    ["process.spawn", "system.exec"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_dangerous_permissions() -> HashSet<String> {
    ["fs.write", "fs.delete", "net.raw", "device.admin"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            allow_unsigned_components: false,
            signing_key: String::new(),
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            trusted_domains: Vec::new(),
            blocked_domains: Vec::new(),
            allowed_permissions: HashSet::new(),
            blocked_permissions: default_blocked_permissions(),
            dangerous_permissions: default_dangerous_permissions(),
        }
    }
}

impl SecurityPolicy {
    /// A permissive policy for tests: unsigned components accepted,
    /// no permission restrictions.
    pub fn permissive() -> Self {
        Self {
            allow_unsigned_components: true,
            blocked_permissions: HashSet::new(),
            dangerous_permissions: HashSet::new(),
            ..Self::default()
        }
    }

    /// Loads policy from a TOML file. Missing or malformed files fall back
    /// to the default policy with a warning.
    pub fn load_from(path: PathBuf) -> Self {
        if !path.exists() {
            info!("no security policy at {:?}, using defaults", path);
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(policy) => {
                    info!("loaded security policy from {:?}", path);
                    policy
                }
                Err(e) => {
                    warn!("failed to parse security policy {:?}: {}. Using defaults.", path, e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("failed to read security policy {:?}: {}. Using defaults.", path, e);
                Self::default()
            }
        }
    }

    /// Trust decision for a source domain: allow-list wins, then the
    /// block-list, default-allow when both are empty.
    #[must_use]
    pub fn is_domain_trusted(&self, domain: &str) -> bool {
        if !self.trusted_domains.is_empty() {
            return self.trusted_domains.iter().any(|d| d == domain);
        }
        if !self.blocked_domains.is_empty() {
            return !self.blocked_domains.iter().any(|d| d == domain);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_require_signatures() {
        let policy = SecurityPolicy::default();
        assert!(!policy.allow_unsigned_components);
        assert!(policy.blocked_permissions.contains("process.spawn"));
    }

    #[test]
    fn empty_lists_default_allow() {
        let policy = SecurityPolicy::default();
        assert!(policy.is_domain_trusted("anywhere.example.com"));
    }

    #[test]
    fn allow_list_takes_precedence() {
        let policy = SecurityPolicy {
            trusted_domains: vec!["cdn.example.com".to_string()],
            blocked_domains: vec!["cdn.example.com".to_string()],
            ..Default::default()
        };
        // On the allow-list, so the block-list never applies.
        assert!(policy.is_domain_trusted("cdn.example.com"));
        assert!(!policy.is_domain_trusted("other.example.com"));
    }

    #[test]
    fn block_list_applies_without_allow_list() {
        let policy = SecurityPolicy {
            blocked_domains: vec!["evil.example.com".to_string()],
            ..Default::default()
        };
        assert!(!policy.is_domain_trusted("evil.example.com"));
        assert!(policy.is_domain_trusted("fine.example.com"));
    }

    #[test]
    fn load_from_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let policy = SecurityPolicy::load_from(dir.path().join("none.toml"));
        assert!(!policy.allow_unsigned_components);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.toml");
        std::fs::write(
            &path,
            r#"
allow_unsigned_components = true
signing_key = "release-key"
max_payload_size = 1024
trusted_domains = ["cdn.example.com"]
"#,
        )
        .unwrap();

        let policy = SecurityPolicy::load_from(path);
        assert!(policy.allow_unsigned_components);
        assert_eq!(policy.signing_key, "release-key");
        assert_eq!(policy.max_payload_size, 1024);
        assert_eq!(policy.trusted_domains, vec!["cdn.example.com"]);
        // Unlisted fields keep their defaults.
        assert!(policy.blocked_permissions.contains("system.exec"));
    }

    #[test]
    fn load_from_malformed_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.toml");
        std::fs::write(&path, "not valid toml {{{").unwrap();

        let policy = SecurityPolicy::load_from(path);
        assert!(!policy.allow_unsigned_components);
    }
}
