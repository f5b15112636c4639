use anyhow::{Context, Result, bail};
use chainrunner::ChainCompiler;
use chainrunner::config::{load_config, load_config_file};
use chainrunner::loader::load_chain;
use colored::*;
use log::info;
use std::env;

use crate::cli::Cli;

pub fn handle_run(cli: &Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => load_config_file(path)?,
        None => load_config(&env::current_dir()?)?,
    };
    let compiler = ChainCompiler::with_ssh(config.session_settings()?);

    // clap enforces exactly one source
    let (source, is_raw) = match (&cli.raw, &cli.file) {
        (Some(raw), _) => (raw.clone(), true),
        (None, Some(path)) => (path.to_string_lossy().into_owned(), false),
        (None, None) => bail!("❌ No chain document given: use --file or --raw"),
    };

    let mut chain = load_chain(&source, is_raw, &compiler).context("Failed to load chain")?;

    if cli.dry_run {
        println!("{} [DRY-RUN] Chain outline:", "::".yellow());
        print!("{}", chain.render());
        return Ok(());
    }

    chain.execute()?;
    info!("{} Chain '{}' finished", "✅".green(), chain.root().name().bold());
    Ok(())
}
