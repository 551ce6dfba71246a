//! Cache command - inspect the cache directory

use crate::cache::CacheReader;
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::error::UseCdnResult;
use crate::ui::{self, UiContext};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct CacheInfo {
    root: String,
    version: u32,
    packages: Vec<String>,
}

/// Execute the cache command
pub fn execute(args: CacheArgs, cache_root: &Path) -> UseCdnResult<()> {
    match args.action {
        CacheAction::Path => {
            println!("{}", cache_root.display());
            Ok(())
        }
        CacheAction::Info { format } => show_info(cache_root, format),
    }
}

fn show_info(cache_root: &Path, format: OutputFormat) -> UseCdnResult<()> {
    let reader = CacheReader::open(cache_root)?;
    let info = CacheInfo {
        root: cache_root.display().to_string(),
        version: crate::cache::CURRENT_VERSION,
        packages: reader.packages()?,
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&info)?),
        OutputFormat::Plain => {
            let ctx = UiContext::detect();
            ui::section(&ctx, "Cache");
            ui::key_value(&ctx, "Location", &info.root);
            ui::key_value(&ctx, "Version", &info.version.to_string());
            ui::key_value(&ctx, "Packages", &info.packages.len().to_string());
            for package in &info.packages {
                println!("    {}", package);
            }
        }
    }

    Ok(())
}
