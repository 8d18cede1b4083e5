//! Connection admission gate.
//!
//! The host fires [`Gate::on_register`] once when a connection presents itself and
//! [`Gate::on_check_ready`] repeatedly until the connection may proceed.
//!
//! Flow Overview:
//! 1) Registration checks the connect class, the password and the domain policy.
//! 2) When a provider round trip is needed the slot is marked `Pending` and the
//!    verification is spawned onto the runtime, so the host's dispatch loop never blocks.
//! 3) The worker resolves the slot to `NotRequired` or `Failed`.
//! 4) Readiness lets `NotRequired` through, holds `Pending`, and quits `Failed`
//!    connections with the configured kill reason.
//! 5) Disconnect drops the slot; a result arriving afterwards is discarded.

pub mod host;
pub mod outcome;
pub mod policy;
pub mod store;
pub mod verifier;


pub use self::host::{Connection, ConnectionClass, ConnectionId, Host, HookResult, CONNECT_SNOMASK};
pub use self::outcome::VerificationOutcome;
pub use self::policy::{Policy, PolicyError, PolicyHandle};
pub use self::store::{PendingStore, SlotHandle};
pub use self::verifier::{account_name, ClientLoginVerifier, CredentialVerifier, VerifyError};

use secrecy::ExposeSecret;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info, info_span, instrument, Instrument};
use ulid::Ulid;

pub const DESCRIPTION: &str = "Allow/Deny connections based on google account authentication.";

pub struct Gate<H, V> {
    host: Arc<H>,
    verifier: Arc<V>,
    policy: PolicyHandle,
    store: PendingStore,
    runtime: Handle,
}

impl<H: Host, V: CredentialVerifier> Gate<H, V> {
    /// Build a gate that spawns verifications onto `runtime`.
    #[must_use]
    pub fn new(host: Arc<H>, verifier: Arc<V>, policy: Policy, runtime: Handle) -> Self {
        Self {
            host,
            verifier,
            policy: PolicyHandle::new(policy),
            store: PendingStore::new(),
            runtime,
        }
    }

    /// Registration hook. Records state for the readiness hook and always passes through.
    #[instrument(skip(self, conn), fields(conn = %conn.id, nick = %conn.nick))]
    pub fn on_register(&self, conn: &Connection) -> HookResult {
        if !conn.class.googleauth {
            debug!("connect class has googleauth disabled");
            return HookResult::Passthrough;
        }

        if self.store.contains(conn.id) {
            return HookResult::Passthrough;
        }

        let policy = self.policy.snapshot();

        if conn.password.expose_secret().is_empty() {
            if policy.verbose() {
                self.host.notice(
                    CONNECT_SNOMASK,
                    &format!(
                        "Forbidden connection from {} (No password provided)",
                        conn.mask()
                    ),
                );
            }
            info!(mask = %conn.mask(), "rejecting connection without password");
            self.store.set(conn.id, VerificationOutcome::Failed);
            return HookResult::Passthrough;
        }

        let Some(account) = account_name(&conn.nick, policy.domain_restriction()) else {
            debug!("no domainrestriction configured, skipping verification");
            return HookResult::Passthrough;
        };

        if policy.verbose() {
            self.host.notice(
                CONNECT_SNOMASK,
                &format!("Attempting to authenticate '{account}' with google..."),
            );
        }

        let slot = self.store.set(conn.id, VerificationOutcome::Pending);
        self.dispatch(conn, account, slot, policy);

        HookResult::Passthrough
    }

    fn dispatch(&self, conn: &Connection, account: String, slot: SlotHandle, policy: Arc<Policy>) {
        let host = Arc::clone(&self.host);
        let verifier = Arc::clone(&self.verifier);
        let secret = conn.password.clone();
        let mask = conn.mask();
        let span = info_span!(
            "verification",
            attempt = %Ulid::new(),
            conn = %conn.id,
            account = %account
        );

        self.runtime.spawn(
            async move {
                let outcome = verifier.verify(&account, &secret).await;

                if !slot.resolve(outcome) {
                    debug!(%outcome, "connection left before verification finished, discarding");
                    return;
                }

                info!(%outcome, "verification finished");

                if outcome == VerificationOutcome::Failed && policy.verbose() {
                    host.notice(
                        CONNECT_SNOMASK,
                        &format!("Google authentication failed for '{account}' ({mask})"),
                    );
                }
            }
            .instrument(span),
        );
    }

    /// Readiness hook. `Deny` keeps the connection waiting; failed connections are also quit.
    pub fn on_check_ready(&self, id: ConnectionId) -> HookResult {
        match self.store.get(id) {
            VerificationOutcome::NotRequired => HookResult::Passthrough,
            VerificationOutcome::Pending => HookResult::Deny,
            VerificationOutcome::Failed => {
                let policy = self.policy.snapshot();
                debug!(conn = %id, "quitting connection that failed verification");
                self.host.quit(id, policy.kill_reason());
                HookResult::Deny
            }
        }
    }

    /// Disconnect hook. Releases whatever the gate recorded for `id`.
    pub fn on_disconnect(&self, id: ConnectionId) {
        if let Some(outcome) = self.store.clear(id) {
            debug!(conn = %id, %outcome, "released verification state");
        }
    }

    /// Rehash hook. Verifications already running keep the policy they started with.
    pub fn on_rehash(&self, policy: Policy) {
        let previous = self.policy.replace(policy);
        let current = self.policy.snapshot();
        info!(
            domainrestriction = current.domain_restriction().unwrap_or(""),
            verbose = current.verbose(),
            changed = *previous != *current,
            "googleauth policy reloaded"
        );
    }

    #[must_use]
    pub fn outcome(&self, id: ConnectionId) -> VerificationOutcome {
        self.store.get(id)
    }

    #[must_use]
    pub fn policy(&self) -> Arc<Policy> {
        self.policy.snapshot()
    }

    #[must_use]
    pub fn tracked_connections(&self) -> usize {
        self.store.len()
    }
}
