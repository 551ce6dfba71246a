//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// use-cdn - fetch front-end assets from public CDNs into a local cache
///
/// Reads a list of packages, versions and files from use-cdn.toml, resolves
/// tags and ranges to concrete versions and downloads each file once.
#[derive(Parser, Debug)]
#[command(name = "use-cdn")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute (defaults to resolve)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "USE_CDN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Cache directory (overrides cache_dir from the configuration)
    #[arg(long, global = true, env = "USE_CDN_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, default_value = "text")]
    pub log_format: LogFormat,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve and download every configured file
    Resolve(ResolveArgs),

    /// List cached files for the configuration without network access
    List(ListArgs),

    /// Inspect the cache
    Cache(CacheArgs),
}

/// Arguments for the resolve command
#[derive(Parser, Debug, Default)]
pub struct ResolveArgs {
    /// Print the local path of every file
    #[arg(short, long)]
    pub print: bool,
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Output format
    #[arg(short, long, default_value = "plain")]
    pub format: OutputFormat,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show cache location, schema version and packages
    Info {
        /// Output format
        #[arg(short, long, default_value = "plain")]
        format: OutputFormat,
    },

    /// Print the cache directory
    Path,
}

/// Output format for list commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Simple text (one per line)
    Plain,
    /// JSON output
    Json,
}

/// Format of log lines on stderr
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable
    Text,
    /// One JSON object per line
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_to_no_command() {
        let cli = Cli::parse_from(["use-cdn"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.verbose, 0);
        assert_eq!(cli.log_format, LogFormat::Text);
    }

    #[test]
    fn cli_parses_resolve() {
        let cli = Cli::parse_from(["use-cdn", "resolve", "--print"]);
        match cli.command {
            Some(Commands::Resolve(args)) => assert!(args.print),
            _ => panic!("expected Resolve command"),
        }
    }

    #[test]
    fn cli_parses_list_json() {
        let cli = Cli::parse_from(["use-cdn", "list", "--format", "json"]);
        match cli.command {
            Some(Commands::List(args)) => assert_eq!(args.format, OutputFormat::Json),
            _ => panic!("expected List command"),
        }
    }

    #[test]
    fn cli_parses_cache_path() {
        let cli = Cli::parse_from(["use-cdn", "cache", "path"]);
        match cli.command {
            Some(Commands::Cache(args)) => assert!(matches!(args.action, CacheAction::Path)),
            _ => panic!("expected Cache command"),
        }
    }

    #[test]
    fn cli_parses_global_flags_after_command() {
        let cli = Cli::parse_from([
            "use-cdn",
            "list",
            "-vv",
            "--config",
            "x.json",
            "--cache-dir",
            "vendor",
            "--log-format",
            "json",
        ]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("x.json")));
        assert_eq!(cli.cache_dir, Some(PathBuf::from("vendor")));
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn cli_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["use-cdn", "list", "--format", "table"]).is_err());
    }
}
