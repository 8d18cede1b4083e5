pub mod connection;
pub mod logging;
pub mod provider;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

pub const ARG_CONFIG: &str = "config";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let command = Command::new("accountgate")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_CONFIG)
                .short('c')
                .long(ARG_CONFIG)
                .help("YAML file with the `googleauth` policy section")
                .long_help(
                    "YAML file with the `googleauth` policy section (domainrestriction, killreason, verbose).\n\nAn empty domainrestriction disables verification entirely.",
                )
                .env("ACCOUNTGATE_CONFIG")
                .required(true),
        );

    let command = connection::with_args(command);
    let command = provider::with_args(command);
    logging::with_args(command)
}
