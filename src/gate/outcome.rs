//! Tri-state verification outcome attached to a registering connection.

use std::fmt;

/// Result of the admission check for a single connection.
///
/// A connection with no recorded outcome is treated exactly like [`VerificationOutcome::NotRequired`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerificationOutcome {
    /// Verification was not needed or it succeeded.
    #[default]
    NotRequired,
    /// Verification is in flight; the connection must not be admitted yet.
    Pending,
    /// Missing or rejected credential, or the provider could not be reached.
    Failed,
}

impl VerificationOutcome {
    pub(crate) const fn as_u8(self) -> u8 {
        match self {
            Self::NotRequired => 0,
            Self::Pending => 1,
            Self::Failed => 2,
        }
    }

    pub(crate) const fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::NotRequired),
            1 => Some(Self::Pending),
            2 => Some(Self::Failed),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotRequired => "not_required",
            Self::Pending => "pending",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_encoding_is_stable() {
        for outcome in [
            VerificationOutcome::NotRequired,
            VerificationOutcome::Pending,
            VerificationOutcome::Failed,
        ] {
            assert_eq!(VerificationOutcome::from_u8(outcome.as_u8()), Some(outcome));
        }
        assert_eq!(VerificationOutcome::from_u8(3), None);
    }

    #[test]
    fn default_is_not_required() {
        assert_eq!(VerificationOutcome::default(), VerificationOutcome::NotRequired);
        assert_eq!(VerificationOutcome::Pending.to_string(), "pending");
    }
}
