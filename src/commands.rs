//! CLI subcommands against a single tier cache.

use clap::Subcommand;
use color_eyre::Result;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

use crate::cache::{SetOptions, Tier, TierCache};

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
  /// Print the value stored under KEY (nothing on a miss)
  Get { key: String },
  /// Store VALUE under KEY; VALUE is parsed as JSON, else stored as a string
  Set {
    key: String,
    value: String,
    /// Time to live in milliseconds
    #[arg(long)]
    ttl_ms: Option<u64>,
    /// Evict least recently used entries beyond this many
    #[arg(long)]
    max_size: Option<usize>,
  },
  /// Delete KEY
  #[command(alias = "remove")]
  Rm { key: String },
  /// Delete every key under the prefix
  Clear,
  /// List raw storage keys under the prefix
  Keys,
  /// Count keys under the prefix
  Size,
  /// Show expiry and last access of every entry under the prefix
  Inspect,
}

impl Command {
  /// Whether the command changes what is stored.
  pub fn mutates(&self) -> bool {
    matches!(
      self,
      Command::Set { .. } | Command::Rm { .. } | Command::Clear
    )
  }
}

/// Parse CLI input as JSON, treating anything unparsable as a plain string.
fn parse_value(raw: &str) -> Value {
  serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Run `command` and return the lines to print.
pub fn run(command: &Command, cache: &TierCache, tier: Tier) -> Result<Vec<String>> {
  if tier == Tier::Session && command.mutates() {
    warn!("Session-scoped tier lives only for this invocation; the change will not persist");
  }

  let lines = match command {
    Command::Get { key } => match cache.get::<Value>(key, tier) {
      Some(value) => vec![serde_json::to_string_pretty(&value)?],
      None => Vec::new(),
    },
    Command::Set {
      key,
      value,
      ttl_ms,
      max_size,
    } => {
      let options = SetOptions {
        storage: tier,
        expiry: ttl_ms.map(Duration::from_millis),
        max_size: *max_size,
      };
      cache.set(key, &parse_value(value), options);
      Vec::new()
    }
    Command::Rm { key } => {
      cache.remove(key, tier);
      Vec::new()
    }
    Command::Clear => {
      cache.clear_all(tier);
      Vec::new()
    }
    Command::Keys => cache.get_all_keys(tier),
    Command::Size => vec![cache.size(tier).to_string()],
    Command::Inspect => cache
      .inspect(tier)
      .iter()
      .map(serde_json::to_string)
      .collect::<Result<Vec<_>, _>>()?,
  };

  Ok(lines)
}
