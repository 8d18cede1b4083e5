use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_NICK: &str = "nick";
pub const ARG_IDENT: &str = "ident";
pub const ARG_HOST: &str = "host";
pub const ARG_PASSWORD: &str = "password";
pub const ARG_SKIP_CLASS: &str = "no-googleauth";

#[derive(Debug, Clone)]
pub struct Options {
    pub nick: String,
    pub ident: String,
    pub host: String,
    pub password: SecretString,
    pub googleauth: bool,
}

impl Options {
    /// Parse the connection to check from matches.
    ///
    /// # Errors
    /// Returns an error if the nick is missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let nick = match matches.get_one::<String>(ARG_NICK) {
            Some(value) if !value.trim().is_empty() => value.trim().to_string(),
            _ => anyhow::bail!("missing required argument: --{ARG_NICK}"),
        };

        let ident = matches
            .get_one::<String>(ARG_IDENT)
            .cloned()
            .unwrap_or_else(|| nick.clone());
        let host = matches
            .get_one::<String>(ARG_HOST)
            .cloned()
            .unwrap_or_else(|| "localhost".to_string());

        // An absent password is a real case: the gate rejects it without a provider call.
        let password = SecretString::from(
            matches
                .get_one::<String>(ARG_PASSWORD)
                .cloned()
                .unwrap_or_default(),
        );

        Ok(Self {
            nick,
            ident,
            host,
            password,
            googleauth: !matches.get_flag(ARG_SKIP_CLASS),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_NICK)
                .short('n')
                .long(ARG_NICK)
                .help("Nick of the connection to check; `_` maps to `.` in the account name")
                .env("ACCOUNTGATE_NICK")
                .required(true),
        )
        .arg(
            Arg::new(ARG_IDENT)
                .long(ARG_IDENT)
                .help("Ident shown in notices (default: nick)"),
        )
        .arg(
            Arg::new(ARG_HOST)
                .long(ARG_HOST)
                .help("Host shown in notices (default: localhost)"),
        )
        .arg(
            Arg::new(ARG_PASSWORD)
                .long(ARG_PASSWORD)
                .help("Connection password checked against the provider")
                .env("ACCOUNTGATE_PASSWORD")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_SKIP_CLASS)
                .long(ARG_SKIP_CLASS)
                .help("Simulate a connect class with googleauth disabled")
                .action(clap::ArgAction::SetTrue),
        )
}
