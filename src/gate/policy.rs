//! Operator policy for the gate and the handle used to swap it on rehash.
//!
//! The policy is read from the `googleauth` section of a YAML document:
//!
//! ```yaml
//! googleauth:
//!   domainrestriction: example.com
//!   killreason: "Google account authentication failed"
//!   verbose: true
//! ```
//!
//! Every key is optional. An empty `domainrestriction` switches the gate off.

use regex::Regex;
use serde::Deserialize;
use std::path::Path;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("failed to read policy file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid policy document: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid domainrestriction: {0:?}")]
    Domain(String),
}

#[derive(Debug, Default, Deserialize)]
struct Document {
    #[serde(default)]
    googleauth: Section,
}

#[derive(Debug, Default, Deserialize)]
struct Section {
    #[serde(default)]
    domainrestriction: String,
    #[serde(default)]
    killreason: String,
    #[serde(default)]
    verbose: bool,
}

/// Immutable snapshot of the operator settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Policy {
    domain_restriction: Option<String>,
    kill_reason: String,
    verbose: bool,
}

impl Policy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the account domain. Empty input disables the gate.
    ///
    /// # Errors
    /// Returns an error if the value is not a DNS name.
    pub fn with_domain_restriction(mut self, domain: &str) -> Result<Self, PolicyError> {
        let domain = domain.trim();
        if domain.is_empty() {
            self.domain_restriction = None;
            return Ok(self);
        }

        if !valid_domain(domain) {
            return Err(PolicyError::Domain(domain.to_string()));
        }

        self.domain_restriction = Some(domain.to_ascii_lowercase());
        Ok(self)
    }

    #[must_use]
    pub fn with_kill_reason(mut self, reason: impl Into<String>) -> Self {
        self.kill_reason = reason.into();
        self
    }

    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Parse the `googleauth` section of a YAML document.
    ///
    /// # Errors
    /// Returns an error if the document is malformed or the domain is invalid.
    pub fn from_yaml(raw: &str) -> Result<Self, PolicyError> {
        // An empty document is a valid, feature-off policy.
        let doc: Document = if raw.trim().is_empty() {
            Document::default()
        } else {
            serde_yaml::from_str(raw)?
        };

        Self::new()
            .with_domain_restriction(&doc.googleauth.domainrestriction)
            .map(|policy| {
                policy
                    .with_kill_reason(doc.googleauth.killreason)
                    .with_verbose(doc.googleauth.verbose)
            })
    }

    /// Read and parse a policy file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let raw = std::fs::read_to_string(path).map_err(|source| PolicyError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&raw)
    }

    #[must_use]
    pub fn domain_restriction(&self) -> Option<&str> {
        self.domain_restriction.as_deref()
    }

    #[must_use]
    pub fn kill_reason(&self) -> &str {
        &self.kill_reason
    }

    #[must_use]
    pub fn verbose(&self) -> bool {
        self.verbose
    }
}

fn valid_domain(domain: &str) -> bool {
    static DOMAIN_RE: OnceLock<Option<Regex>> = OnceLock::new();
    DOMAIN_RE
        .get_or_init(|| {
            Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$")
                .ok()
        })
        .as_ref()
        .map_or(false, |re| re.is_match(domain))
}

/// Shared, swappable reference to the active [`Policy`].
#[derive(Debug)]
pub struct PolicyHandle {
    current: RwLock<Arc<Policy>>,
}

impl PolicyHandle {
    #[must_use]
    pub fn new(policy: Policy) -> Self {
        Self {
            current: RwLock::new(Arc::new(policy)),
        }
    }

    /// The snapshot in force right now. Callers keep it for the whole operation.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Policy> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replace the active snapshot wholesale, returning the previous one.
    pub fn replace(&self, policy: Policy) -> Arc<Policy> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, Arc::new(policy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_full_section() -> Result<(), PolicyError> {
        let policy = Policy::from_yaml(
            "googleauth:\n  domainrestriction: Example.com\n  killreason: \"Bad password\"\n  verbose: true\n",
        )?;

        assert_eq!(policy.domain_restriction(), Some("example.com"));
        assert_eq!(policy.kill_reason(), "Bad password");
        assert!(policy.verbose());
        Ok(())
    }

    #[test]
    fn missing_keys_use_defaults() -> Result<(), PolicyError> {
        let policy = Policy::from_yaml("googleauth: {}\n")?;
        assert_eq!(policy, Policy::default());

        let policy = Policy::from_yaml("")?;
        assert_eq!(policy.domain_restriction(), None);
        assert_eq!(policy.kill_reason(), "");
        assert!(!policy.verbose());
        Ok(())
    }

    #[test]
    fn empty_domain_disables_gate() -> Result<(), PolicyError> {
        let policy = Policy::from_yaml("googleauth:\n  domainrestriction: \"\"\n")?;
        assert_eq!(policy.domain_restriction(), None);
        Ok(())
    }

    #[test]
    fn rejects_malformed_domain() {
        for bad in ["exa mple.com", "@example.com", "example.com/", "-example.com"] {
            let result = Policy::new().with_domain_restriction(bad);
            assert!(
                matches!(result, Err(PolicyError::Domain(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn rejects_malformed_yaml() {
        let result = Policy::from_yaml("googleauth: [unterminated");
        assert!(matches!(result, Err(PolicyError::Parse(_))));
    }

    #[test]
    fn load_reads_file() -> anyhow::Result<()> {
        let path = std::env::temp_dir().join(format!("accountgate-{}.yaml", ulid::Ulid::new()));
        let mut file = std::fs::File::create(&path)?;
        writeln!(file, "googleauth:\n  domainrestriction: corp.example.org")?;
        drop(file);

        let policy = Policy::load(&path);
        std::fs::remove_file(&path)?;

        assert_eq!(policy?.domain_restriction(), Some("corp.example.org"));
        Ok(())
    }

    #[test]
    fn load_missing_file_fails() {
        let result = Policy::load(Path::new("/nonexistent/accountgate.yaml"));
        assert!(matches!(result, Err(PolicyError::Read { .. })));
    }

    #[test]
    fn replace_keeps_old_snapshot_alive() -> Result<(), PolicyError> {
        let handle = PolicyHandle::new(Policy::new().with_kill_reason("first"));
        let held = handle.snapshot();

        let previous = handle.replace(
            Policy::new()
                .with_domain_restriction("example.com")?
                .with_kill_reason("second"),
        );

        assert_eq!(previous.kill_reason(), "first");
        assert_eq!(held.kill_reason(), "first");
        assert_eq!(handle.snapshot().kill_reason(), "second");
        Ok(())
    }
}
