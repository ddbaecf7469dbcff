use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use homedir::my_home;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

mod analytics;
mod cli;
mod clippings;
mod config;
mod export;
mod semantic;
#[cfg(test)]
mod tests;

use config::Config;

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    };

    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    // Also installs the `log` bridge, so library `log::` calls land here
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Data directory: `$MARGINALIA_BASE_PATH`, else `~/.local/share/marginalia`
fn base_path() -> anyhow::Result<PathBuf> {
    if let Ok(path) = std::env::var("MARGINALIA_BASE_PATH") {
        return Ok(PathBuf::from(path));
    }

    let home = my_home()
        .context("Could not determine home directory")?
        .context("Home directory path is empty")?;
    Ok(home.join(".local/share/marginalia"))
}

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();
    init_logging(args.verbose);

    let base_path = base_path()?;
    let config = Config::load_with(&base_path)
        .with_context(|| format!("failed to load config from {}", base_path.display()))?;

    cli::run(args, &config)
}
