//! `scenario-root` — Materializes the virtual charm root for a charm directory.
//!
//! Writes `metadata.yaml`, `config.yaml` and `actions.yaml` as a run would
//! see them, links the charm's `src/` and `lib/`, and lists what ended up in
//! the output directory. The output is left in place.
//!
//! **Usage:**
//! ```
//! scenario-root --charm-dir <dir> --out <dir> [--verbose]
//! ```

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use ops_scenario::root::{list_files, VirtualCharmRoot};
use scenario_state::CharmSpec;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Lay out a charm root the way a scenario run prepares it.
#[derive(Parser)]
#[command(
    name = "scenario-root",
    about = "Write the charm root a scenario run would use into a directory"
)]
struct Args {
    /// Charm directory holding metadata.yaml or charmcraft.yaml.
    #[arg(long, default_value = ".")]
    charm_dir: PathBuf,

    /// Output directory; created when missing.
    #[arg(long)]
    out: PathBuf,

    /// Log at debug level.
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let spec = CharmSpec::autoload(&args.charm_dir)
        .with_context(|| format!("Failed to load charm metadata from {}", args.charm_dir.display()))?;
    debug!(charm = %spec.meta.name, "metadata loaded");

    let charm_dir = args.charm_dir.canonicalize().ok();
    if charm_dir.is_some() && charm_dir == args.out.canonicalize().ok() {
        bail!("--out must differ from --charm-dir");
    }

    let root = VirtualCharmRoot::build(&spec, Some(&args.out))
        .with_context(|| format!("Failed to materialize charm root in {}", args.out.display()))?;
    let out = root.keep();

    println!("Charm root: {} ({})", out.display(), spec.meta.name);
    println!("==============================");
    let files = list_files(&out);
    for file in &files {
        println!("  {}", file.display());
    }
    println!();
    println!("Summary: {} file(s)", files.len());
    info!(files = files.len(), out = %out.display(), "charm root written");
    Ok(())
}
