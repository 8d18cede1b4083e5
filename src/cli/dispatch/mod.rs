//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to the action the binary runs.

use crate::cli::actions::{check::Args, Action};
use crate::cli::commands::{connection, provider, ARG_CONFIG};
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Map validated CLI matches to a check action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let config = matches
        .get_one::<String>(ARG_CONFIG)
        .map(PathBuf::from)
        .context("missing required argument: --config")?;

    let connection = connection::Options::parse(matches)?;
    let provider = provider::Options::parse(matches)?;

    Ok(Action::Check(Args {
        config,
        connection,
        provider,
    }))
}
