//! Tokens command implementation.

use super::{open_tokens, CommandResult};
use docsync_engine::{Clock, SystemClock};
use docsync_protocol::TokenResult;
use docsync_store::TokenStore;
use serde::Serialize;
use std::path::Path;

/// A cached token as listed by the CLI. The token itself is never printed.
#[derive(Debug, Serialize)]
pub struct TokenEntry {
    /// Partition name.
    pub partition: String,
    /// Absolute expiry (epoch millis).
    pub ttl: i64,
    /// Whether the token is still usable.
    pub valid: bool,
}

impl TokenEntry {
    fn from_token(token: &TokenResult, now_millis: i64) -> Self {
        Self {
            partition: token.partition.clone(),
            ttl: token.ttl,
            valid: token.is_valid_at(now_millis),
        }
    }
}

/// Runs the tokens command.
pub fn run(path: &Path, format: &str) -> CommandResult<()> {
    let store = open_tokens(path)?;
    let now = SystemClock.now_millis();
    let entries: Vec<TokenEntry> = store
        .list()?
        .iter()
        .map(|t| TokenEntry::from_token(t, now))
        .collect();

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        _ => {
            println!("Cached tokens: {}", entries.len());
            for entry in &entries {
                println!(
                    "  {:<32} ttl={} {}",
                    entry.partition,
                    entry.ttl,
                    if entry.valid { "valid" } else { "expired" }
                );
            }
        }
    }

    Ok(())
}
