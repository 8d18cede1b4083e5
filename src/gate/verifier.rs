//! Credential verification against the Google `ClientLogin` endpoint.
//!
//! Flow Overview:
//! 1) Derive the provider account from the nick: `_` becomes `.`, then `@<domain>` is appended.
//! 2) POST the account and password as a form to the login endpoint over verified TLS.
//! 3) HTTP 200 means the credential is good; every other status, transport error
//!    or timeout fails the connection. There are no retries.
//!
//! Security boundary: only `https` endpoints are accepted and certificate/hostname
//! checks are never relaxed. Without a working TLS channel verification fails closed.

use anyhow::{anyhow, Context, Result};
use reqwest::{Certificate, Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

use super::outcome::VerificationOutcome;

pub const GOOGLE_AUTH_URL: &str = "https://www.google.com/accounts/ClientLogin";
pub const GOOGLE_AUTH_SERVICE: &str = "cp";
pub const GOOGLE_ACCOUNT_TYPE: &str = "GOOGLE";
pub const CLIENT_SOURCE: &str = env!("CARGO_PKG_NAME");

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Build the provider account name for `nick`, or `None` when no domain is configured.
#[must_use]
pub fn account_name(nick: &str, domain: Option<&str>) -> Option<String> {
    let domain = domain.filter(|d| !d.is_empty())?;
    Some(format!("{}@{domain}", nick.replace('_', ".")))
}

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("no password provided")]
    MissingCredential,
    #[error("provider rejected credential: {status}")]
    Rejected { status: StatusCode },
    #[error("provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl From<VerifyError> for VerificationOutcome {
    fn from(_: VerifyError) -> Self {
        Self::Failed
    }
}

/// One verification round trip against an identity provider.
pub trait CredentialVerifier: Send + Sync + 'static {
    /// Check `secret` for `account`. Resolves to `NotRequired` on success and `Failed` otherwise.
    fn verify(
        &self,
        account: &str,
        secret: &SecretString,
    ) -> impl Future<Output = VerificationOutcome> + Send;
}

#[derive(Debug, Clone)]
pub struct ClientLoginVerifier {
    client: Client,
    endpoint: Url,
}

impl ClientLoginVerifier {
    /// Build a verifier for `endpoint`.
    ///
    /// # Errors
    /// Returns an error if the endpoint is not an `https` URL, the CA bundle cannot be
    /// read, or the TLS client cannot be built.
    pub fn new(endpoint: &str, ca_path: Option<&Path>, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint).context("Invalid identity provider URL")?;
        if endpoint.scheme() != "https" {
            return Err(anyhow!("Identity provider URL must use https: {endpoint}"));
        }

        let mut builder = Client::builder()
            .use_rustls_tls()
            .https_only(true)
            .user_agent(crate::APP_USER_AGENT)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(timeout);

        if let Some(path) = ca_path {
            builder = builder.add_root_certificate(load_ca(path)?);
        }

        let client = builder
            .build()
            .context("Failed to build identity provider HTTP client")?;

        Ok(Self { client, endpoint })
    }

    /// Verifier for the public Google endpoint with default timeouts.
    ///
    /// # Errors
    /// Returns an error if the TLS client cannot be built.
    pub fn google() -> Result<Self> {
        Self::new(GOOGLE_AUTH_URL, None, DEFAULT_REQUEST_TIMEOUT)
    }

    #[cfg(test)]
    pub(crate) fn with_client(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    #[instrument(skip(self, secret), fields(endpoint = %self.endpoint))]
    async fn login(&self, account: &str, secret: &SecretString) -> Result<(), VerifyError> {
        if secret.expose_secret().is_empty() {
            return Err(VerifyError::MissingCredential);
        }

        let form = [
            ("Email", account),
            ("Passwd", secret.expose_secret()),
            ("accountType", GOOGLE_ACCOUNT_TYPE),
            ("source", CLIENT_SOURCE),
            ("service", GOOGLE_AUTH_SERVICE),
        ];

        let response = self
            .client
            .post(self.endpoint.clone())
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        debug!(%status, "identity provider answered");

        if status == StatusCode::OK {
            Ok(())
        } else {
            Err(VerifyError::Rejected { status })
        }
    }
}

impl CredentialVerifier for ClientLoginVerifier {
    async fn verify(&self, account: &str, secret: &SecretString) -> VerificationOutcome {
        match self.login(account, secret).await {
            Ok(()) => VerificationOutcome::NotRequired,
            Err(err) => {
                warn!(account, error = %err, "credential verification failed");
                err.into()
            }
        }
    }
}

fn load_ca(path: &Path) -> Result<Certificate> {
    let pem = std::fs::read(path)
        .with_context(|| format!("Failed to read CA bundle {}", path.display()))?;
    Certificate::from_pem(&pem).with_context(|| format!("Invalid CA bundle {}", path.display()))
}
