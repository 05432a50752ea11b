pub mod budget;
pub mod cli;
pub mod clubs;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod day_panel;
pub mod event;
pub mod filter;
pub mod grid;
pub mod members;
pub mod render;
pub mod seed;
pub mod state;

use std::ffi::OsString;

use anyhow::{
  Context,
  anyhow
};
use clap::Parser;
use tracing::{
  debug,
  info
};

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
    "starting nota CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.notarc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let store =
    seed::SeedStore::open(&data_dir);

  let today = match cli.today.as_deref()
  {
    | Some(raw) => {
      datetime::parse_iso_date(raw)
        .ok_or_else(|| {
          anyhow!(
            "invalid --today value: \
             {raw} (expected \
             YYYY-MM-DD)"
          )
        })?
    }
    | None => datetime::project_today()
  };
  debug!(%today, "resolved calendar anchor date");

  let renderer =
    render::Renderer::new(&cfg)?;
  let inv = cli::Invocation::parse(
    &cfg, cli.rest
  )?;

  commands::dispatch(
    &store, &cfg, &renderer, inv, today
  )?;

  info!("done");
  Ok(())
}
