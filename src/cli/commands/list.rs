//! List command - show cached files for the configuration

use crate::cli::args::{ListArgs, OutputFormat};
use crate::config::{Config, Overrides};
use crate::error::UseCdnResult;
use crate::orchestrator::resolved_files;
use std::path::{Path, PathBuf};

/// Execute the list command. Reads the cache only, never the network.
pub fn execute(args: ListArgs, config: &Config, cache_root: &Path) -> UseCdnResult<()> {
    let overrides = Overrides::from_env()?;
    let files = resolved_files(config, &overrides, cache_root)?;

    match args.format {
        OutputFormat::Plain => print_plain(&files),
        OutputFormat::Json => print_json(&files)?,
    }

    Ok(())
}

fn print_plain(files: &[PathBuf]) {
    for file in files {
        println!("{}", file.display());
    }
}

fn print_json(files: &[PathBuf]) -> UseCdnResult<()> {
    let json = serde_json::to_string_pretty(files)?;
    println!("{}", json);
    Ok(())
}
