use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use std::time::Duration;

use portal_cache::cache::{Tier, TierCache, Tiers};
use portal_cache::commands::{self, Command};
use portal_cache::config::Config;
use portal_cache::logging;

#[derive(Parser, Debug)]
#[command(name = "portal-cache")]
#[command(about = "Inspect and edit the education portal's client-side cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/portal-cache/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Storage tier: session-scoped or device-scoped
  #[arg(short, long)]
  tier: Option<Tier>,

  /// Key prefix (namespace) to operate on
  #[arg(short, long)]
  prefix: Option<String>,

  #[command(subcommand)]
  command: Command,
}

fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;
  let _log_guard = logging::init(&config.logging)?;

  let tier = args.tier.unwrap_or(config.cache.default_tier);
  let prefix = args.prefix.unwrap_or_else(|| config.cache.prefix.clone());

  let cache = TierCache::new(prefix, Tiers::open(&config.storage))
    .with_default_ttl(Duration::from_millis(config.cache.default_ttl_ms));

  for line in commands::run(&args.command, &cache, tier)? {
    println!("{}", line);
  }

  Ok(())
}
