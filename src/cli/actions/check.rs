//! One-shot admission check.
//!
//! Runs a synthetic connection through the same hooks a chat server would fire:
//! register once, then poll readiness until the verdict is known.

use crate::cli::commands::{connection, provider};
use crate::gate::{
    account_name, ClientLoginVerifier, Connection, ConnectionClass, ConnectionId,
    CredentialVerifier, Gate, HookResult, Host, Policy,
};
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(50);
const CHECK_CONNECTION_ID: ConnectionId = ConnectionId::new(1);

#[derive(Debug)]
pub struct Args {
    pub config: PathBuf,
    pub connection: connection::Options,
    pub provider: provider::Options,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub nick: String,
    pub account: Option<String>,
    pub outcome: String,
    pub admitted: bool,
    pub reason: Option<String>,
}

/// Logs notices and remembers the quit reason.
#[derive(Debug, Default)]
struct ConsoleHost {
    quit_reason: Mutex<Option<String>>,
}

impl ConsoleHost {
    fn quit_reason(&self) -> Option<String> {
        self.quit_reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Host for ConsoleHost {
    fn quit(&self, id: ConnectionId, reason: &str) {
        warn!(conn = %id, reason, "connection quit");
        *self.quit_reason.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(reason.to_string());
    }

    fn notice(&self, snomask: char, message: &str) {
        info!(%snomask, "{message}");
    }
}

/// Execute the check action.
/// # Errors
/// Returns an error if the policy or provider settings are invalid, or the connection is rejected.
pub async fn execute(args: Args) -> Result<()> {
    let policy = Policy::load(&args.config)
        .with_context(|| format!("Could not load policy from {}", args.config.display()))?;
    log_startup_args(&args, &policy);

    let verifier = ClientLoginVerifier::new(
        &args.provider.url,
        args.provider.ca_path.as_deref(),
        args.provider.timeout,
    )?;

    // Leave headroom over the HTTP timeout so the verifier always answers first.
    let deadline = args.provider.timeout + Duration::from_secs(5);
    let report = run(Arc::new(verifier), policy, &args.connection, deadline).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.admitted {
        Ok(())
    } else {
        Err(anyhow!(
            "connection rejected: {}",
            report.reason.as_deref().unwrap_or("")
        ))
    }
}

/// Drive one connection through the gate and report the verdict.
///
/// # Errors
/// Returns an error if the verdict is still pending after `deadline`.
pub async fn run<V: CredentialVerifier>(
    verifier: Arc<V>,
    policy: Policy,
    opts: &connection::Options,
    deadline: Duration,
) -> Result<Report> {
    let host = Arc::new(ConsoleHost::default());
    let account = account_name(&opts.nick, policy.domain_restriction());
    let gate = Gate::new(Arc::clone(&host), verifier, policy, Handle::current());

    let conn = Connection::new(CHECK_CONNECTION_ID, opts.nick.clone(), opts.password.clone())
        .with_ident(opts.ident.clone())
        .with_host(opts.host.clone())
        .with_class(ConnectionClass {
            googleauth: opts.googleauth,
        });

    gate.on_register(&conn);

    let started = Instant::now();
    let ready = loop {
        let ready = gate.on_check_ready(conn.id);
        let outcome = gate.outcome(conn.id);
        if !outcome.is_pending() {
            break ready;
        }
        if started.elapsed() > deadline {
            gate.on_disconnect(conn.id);
            return Err(anyhow!("verification still pending after {deadline:?}"));
        }
        debug!("waiting for verification");
        sleep(READY_POLL_INTERVAL).await;
    };

    let outcome = gate.outcome(conn.id);
    gate.on_disconnect(conn.id);

    Ok(Report {
        nick: opts.nick.clone(),
        account: conn.class.googleauth.then_some(account).flatten(),
        outcome: outcome.to_string(),
        admitted: ready == HookResult::Passthrough,
        reason: host.quit_reason(),
    })
}

fn log_startup_args(args: &Args, policy: &Policy) {
    let entries = [
        ("config", args.config.display().to_string()),
        (
            "domainrestriction",
            policy
                .domain_restriction()
                .unwrap_or("none (gate disabled)")
                .to_string(),
        ),
        ("verbose", policy.verbose().to_string()),
        ("provider_url", args.provider.url.clone()),
        (
            "provider_ca_path",
            args.provider
                .ca_path
                .as_ref()
                .map_or_else(|| "none".to_string(), |p| p.display().to_string()),
        ),
        ("provider_timeout", format!("{}s", args.provider.timeout.as_secs())),
        ("nick", args.connection.nick.clone()),
        ("googleauth", args.connection.googleauth.to_string()),
    ];

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} - {}\n\nCheck configuration:",
        crate::gate::DESCRIPTION,
        env!("CARGO_PKG_VERSION")
    );
    for (key, value) in &entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::VerificationOutcome;
    use secrecy::SecretString;

    struct FixedVerifier(VerificationOutcome);

    impl CredentialVerifier for FixedVerifier {
        async fn verify(&self, _account: &str, _secret: &SecretString) -> VerificationOutcome {
            self.0
        }
    }

    fn options(nick: &str, password: &str) -> connection::Options {
        connection::Options {
            nick: nick.to_string(),
            ident: "alice".to_string(),
            host: "localhost".to_string(),
            password: SecretString::from(password.to_string()),
            googleauth: true,
        }
    }

    fn policy() -> Result<Policy> {
        Ok(Policy::new()
            .with_domain_restriction("example.com")?
            .with_kill_reason("Google authentication failed"))
    }

    #[tokio::test]
    async fn accepted_connection_is_admitted() -> Result<()> {
        let report = run(
            Arc::new(FixedVerifier(VerificationOutcome::NotRequired)),
            policy()?,
            &options("alice_b", "hunter2"),
            Duration::from_secs(5),
        )
        .await?;

        assert_eq!(
            report,
            Report {
                nick: "alice_b".to_string(),
                account: Some("alice.b@example.com".to_string()),
                outcome: "not_required".to_string(),
                admitted: true,
                reason: None,
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn rejected_connection_reports_kill_reason() -> Result<()> {
        let report = run(
            Arc::new(FixedVerifier(VerificationOutcome::Failed)),
            policy()?,
            &options("alice_b", "hunter2"),
            Duration::from_secs(5),
        )
        .await?;

        assert!(!report.admitted);
        assert_eq!(report.outcome, "failed");
        assert_eq!(report.reason.as_deref(), Some("Google authentication failed"));
        Ok(())
    }

    #[tokio::test]
    async fn missing_password_is_rejected() -> Result<()> {
        let report = run(
            Arc::new(FixedVerifier(VerificationOutcome::NotRequired)),
            policy()?,
            &options("alice_b", ""),
            Duration::from_secs(5),
        )
        .await?;

        assert!(!report.admitted);
        assert_eq!(report.outcome, "failed");
        Ok(())
    }

    #[tokio::test]
    async fn disabled_class_reports_no_account() -> Result<()> {
        let mut opts = options("alice_b", "");
        opts.googleauth = false;

        let report = run(
            Arc::new(FixedVerifier(VerificationOutcome::Failed)),
            policy()?,
            &opts,
            Duration::from_secs(5),
        )
        .await?;

        assert!(report.admitted);
        assert_eq!(report.account, None);
        Ok(())
    }

    #[test]
    fn report_serializes_as_json() -> Result<()> {
        let report = Report {
            nick: "alice_b".to_string(),
            account: None,
            outcome: "not_required".to_string(),
            admitted: true,
            reason: None,
        };
        let value = serde_json::to_value(&report)?;
        assert_eq!(value["admitted"], serde_json::json!(true));
        assert_eq!(value["account"], serde_json::Value::Null);
        Ok(())
    }
}
