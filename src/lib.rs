//! # Accountgate (Google account admission for chat servers)
//!
//! `accountgate` holds newly registering chat connections until the password they
//! supplied has been checked against Google's `ClientLogin` endpoint. It is embedded
//! in a host server through four hooks on [`gate::Gate`]:
//!
//! - **register:** fired once per connection. Records a verdict or dispatches a
//!   verification onto the tokio runtime.
//! - **check ready:** fired until the connection may proceed. Pending connections
//!   are held, failed ones are quit with the configured kill reason.
//! - **disconnect:** releases the connection's state; late results are dropped.
//! - **rehash:** swaps the operator policy without disturbing running checks.
//!
//! ## Account mapping
//!
//! The nick is the account: underscores become dots and the configured
//! `domainrestriction` is appended, so `alice_b` on `example.com` is checked as
//! `alice.b@example.com`. Without a `domainrestriction` the gate does nothing.
//!
//! ## Failure model
//!
//! A missing password, a non-200 answer, a TLS problem or a timeout all fail the
//! connection the same way. Nothing is retried.

pub mod cli;
pub mod gate;

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with("accountgate/"));
        assert_eq!(
            APP_USER_AGENT,
            format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
        );
    }
}
