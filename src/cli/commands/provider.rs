use crate::gate::verifier::{DEFAULT_REQUEST_TIMEOUT, GOOGLE_AUTH_URL};
use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;
use std::time::Duration;

pub const ARG_PROVIDER_URL: &str = "provider-url";
pub const ARG_PROVIDER_CA_PATH: &str = "provider-ca-path";
pub const ARG_PROVIDER_TIMEOUT: &str = "provider-timeout";

#[derive(Debug, Clone)]
pub struct Options {
    pub url: String,
    pub ca_path: Option<PathBuf>,
    pub timeout: Duration,
}

impl Options {
    /// Parse identity provider arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the provider URL is empty.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let url = match matches.get_one::<String>(ARG_PROVIDER_URL) {
            Some(value) if !value.trim().is_empty() => value.trim().to_string(),
            _ => anyhow::bail!("missing required argument: --{ARG_PROVIDER_URL}"),
        };

        let ca_path = matches
            .get_one::<String>(ARG_PROVIDER_CA_PATH)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let timeout = matches
            .get_one::<u64>(ARG_PROVIDER_TIMEOUT)
            .copied()
            .map_or(DEFAULT_REQUEST_TIMEOUT, Duration::from_secs);

        Ok(Self {
            url,
            ca_path,
            timeout,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_PROVIDER_URL)
                .long(ARG_PROVIDER_URL)
                .help("Identity provider login endpoint (https only)")
                .default_value(GOOGLE_AUTH_URL)
                .env("ACCOUNTGATE_PROVIDER_URL"),
        )
        .arg(
            Arg::new(ARG_PROVIDER_CA_PATH)
                .long(ARG_PROVIDER_CA_PATH)
                .help("Extra CA bundle (PEM) trusted for the provider endpoint")
                .env("ACCOUNTGATE_PROVIDER_CA_PATH"),
        )
        .arg(
            Arg::new(ARG_PROVIDER_TIMEOUT)
                .long(ARG_PROVIDER_TIMEOUT)
                .help("Seconds to wait for the provider before failing the connection")
                .default_value("15")
                .env("ACCOUNTGATE_PROVIDER_TIMEOUT")
                .value_parser(clap::value_parser!(u64).range(1..=300)),
        )
}
