//! use-cdn - CDN asset fetcher
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use use_cdn::cache::DEFAULT_ROOT;
use use_cdn::cli::args::ResolveArgs;
use use_cdn::cli::{Cli, Commands, LogFormat};
use use_cdn::config::{Config, ConfigManager};
use use_cdn::error::UseCdnResult;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> UseCdnResult<()> {
    let cli = Cli::parse();

    // Initialize logging: 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("use_cdn=warn"),
        1 => EnvFilter::new("use_cdn=info"),
        _ => EnvFilter::new("use_cdn=debug"),
    };

    match cli.log_format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }

    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };
    debug!("Using config {}", config_manager.path().display());

    // Cache commands work without a configuration file
    if let Some(Commands::Cache(args)) = cli.command {
        let config = config_manager.load_optional().await?;
        let root = cache_root(cli.cache_dir, config.as_ref());
        return use_cdn::cli::commands::cache(args, &root);
    }

    let config = config_manager.load().await?;
    let root = cache_root(cli.cache_dir, Some(&config));

    match cli.command {
        None => use_cdn::cli::commands::resolve(ResolveArgs::default(), config, root).await,
        Some(Commands::Resolve(args)) => use_cdn::cli::commands::resolve(args, config, root).await,
        Some(Commands::List(args)) => use_cdn::cli::commands::list(args, &config, &root),
        Some(Commands::Cache(_)) => unreachable!("Cache handled above"),
    }
}

/// `--cache-dir`, else the configured directory, else the default
fn cache_root(flag: Option<PathBuf>, config: Option<&Config>) -> PathBuf {
    flag.or_else(|| config.map(Config::cache_root))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT))
}
