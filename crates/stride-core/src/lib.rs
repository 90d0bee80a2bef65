pub mod calendar;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod model;
pub mod quarter;
pub mod remote;
pub mod render;
pub mod session;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};

#[tracing::instrument(skip_all)]
pub fn run(raw_args: Vec<OsString>) -> anyhow::Result<()> {
    let cli = cli::GlobalCli::parse_from(raw_args);

    cli::init_tracing(cli.verbose, cli.quiet)?;

    info!(verbose = cli.verbose, quiet = cli.quiet, "starting stride CLI");

    let cfg = config::Config::load(cli.config.as_deref())?;
    if let Some(path) = &cfg.loaded_file {
        debug!(config = %path.display(), "config loaded");
    }

    let data_dir = config::resolve_data_dir(cli.data.as_deref())
        .context("failed to resolve data directory")?;

    let mut ctx = commands::Ctx::new(cfg, &data_dir);
    commands::dispatch(&mut ctx, cli.command)
}
