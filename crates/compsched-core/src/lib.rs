pub mod activity_code;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod days;
pub mod document;
pub mod filter;
pub mod render;
pub mod timetable;
pub mod tree;
pub mod venue;
pub mod wcif;

use std::ffi::OsString;

use clap::Parser;
use tracing::{
  debug,
  info
};

pub use timetable::{
  DayBucket,
  ScheduledActivity,
  Timetable,
  TimetableOptions
};
pub use wcif::Competition;

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting compsched"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.rcfile.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let mut renderer =
    render::Renderer::new(&cfg)?;
  let inv = cli::Invocation::parse(
    &cfg, cli.rest
  )?;

  commands::dispatch(
    &cfg,
    &mut renderer,
    inv
  )?;

  info!("done");
  Ok(())
}
