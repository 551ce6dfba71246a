//! Resolve command - download every configured file into the cache

use crate::cli::args::ResolveArgs;
use crate::config::{Config, Overrides};
use crate::error::UseCdnResult;
use crate::orchestrator::Orchestrator;
use crate::ui::{self, TaskSpinner, UiContext};
use std::path::PathBuf;

/// Execute the resolve command
pub async fn execute(args: ResolveArgs, config: Config, cache_root: PathBuf) -> UseCdnResult<()> {
    let ctx = UiContext::detect();
    let overrides = Overrides::from_env()?;
    if !overrides.is_empty() {
        ui::step_info(&ctx, "Applying version overrides from the environment");
    }

    let orchestrator = Orchestrator::new(config)
        .with_overrides(overrides)
        .with_cache_dir(cache_root);

    let file_count = orchestrator.config().file_count();
    if file_count == 0 {
        ui::step_warn(&ctx, "No packages configured");
    }
    orchestrator.init().await?;

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Resolving {} file(s)...", file_count));
    let paths = match orchestrator.resolve().await {
        Ok(paths) => paths,
        Err(e) => {
            spinner.stop_error("Resolution failed");
            return Err(e);
        }
    };
    spinner.stop(&format!(
        "Resolved {} file(s) into {}",
        paths.len(),
        orchestrator.cache().paths().root().display()
    ));

    if args.print {
        for path in &paths {
            println!("{}", path.display());
        }
    }

    Ok(())
}
