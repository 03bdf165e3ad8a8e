//! Structured logging setup: env-filter driven verbosity, ANSI when attached
//! to a terminal, compact timestamps when interactive, a single `fmt` layer.
//! There is no admin UI in this process, so there's no JSON console layer,
//! socket logger, or database-backed log viewer to wire up.

use std::io::IsTerminal;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::Cli;

pub fn init_logging(cli: &Cli) -> Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        let directive = match cli.debug {
            0 => "superchat=info",
            1 => "superchat=debug",
            _ => "debug",
        };
        std::env::set_var("RUST_LOG", directive);
    }

    let env_filter = EnvFilter::try_from_default_env().context("parsing RUST_LOG")?;
    let interactive = std::io::stderr().is_terminal();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(interactive)
        .with_target(!interactive)
        .compact()
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}
