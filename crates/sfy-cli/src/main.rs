//! sfy CLI
//!
//! Offline helpers for inspecting what the toolkit records: visit keys,
//! stored history payloads, cookie keys and beacon URLs.

use std::fs;

use clap::{Parser, Subcommand};
use serde::Serialize;

use sfy_core::beacon::{request_url, visit_beacon_url};
use sfy_core::clock::{gmt_string, Clock, SystemClock};
use sfy_core::cookie::is_valid_key;
use sfy_core::history::{Decoded, VisitHistory};
use sfy_core::storage::entry;
use sfy_core::{ToolkitConfig, VisitKey};

#[derive(Parser)]
#[command(name = "sfy-cli")]
#[command(about = "sfy retargeting toolkit tools")]
struct Cli {
    /// JSON toolkit config (defaults apply to missing fields)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive the visit key and digest for an identity on a page
    Key {
        /// Global id
        #[arg(short, long)]
        identity: String,

        /// Top page URL
        #[arg(short, long)]
        url: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Decode a stored visit history payload
    History {
        /// Raw stored value, with or without the `;expires=` suffix
        #[arg(short, long)]
        raw: String,

        /// Evaluate as of this epoch millisecond instead of now
        #[arg(short, long)]
        now: Option<i64>,
    },

    /// Check whether a cookie key is accepted
    CookieKey {
        key: String,
    },

    /// Build the visit beacon URL
    Beacon {
        /// Global id
        #[arg(short, long)]
        identity: String,

        /// Top page URL
        #[arg(short, long)]
        url: String,

        /// Click parameter (the page query string without `?`)
        #[arg(short = 'k', long)]
        click: String,

        /// Append the cache-busting token
        #[arg(long)]
        cache_buster: bool,
    },
}

#[derive(Serialize)]
struct KeyReport {
    identity: String,
    segments: Vec<String>,
    composite: String,
    digest: String,
}

fn main() {
    let cli = Cli::parse();

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Key {
            identity,
            url,
            json,
        } => cmd_key(&identity, &url, json),
        Commands::History { raw, now } => cmd_history(&config, &raw, now),
        Commands::CookieKey { key } => cmd_cookie_key(&key),
        Commands::Beacon {
            identity,
            url,
            click,
            cache_buster,
        } => cmd_beacon(&config, &identity, &url, &click, cache_buster),
    });

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn load_config(path: Option<&str>) -> Result<ToolkitConfig, String> {
    let path = match path {
        Some(path) => path,
        None => return Ok(ToolkitConfig::default()),
    };
    let text = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    ToolkitConfig::from_json(&text).map_err(|e| format!("Invalid config '{}': {}", path, e))
}

fn cmd_key(identity: &str, url: &str, json: bool) -> Result<(), String> {
    let key = VisitKey::derive(identity, url);
    let report = KeyReport {
        identity: identity.to_string(),
        segments: key.segments.clone(),
        composite: key.composite(),
        digest: key.digest(),
    };

    if json {
        let text = serde_json::to_string_pretty(&report)
            .map_err(|e| format!("Failed to serialize: {}", e))?;
        println!("{}", text);
        return Ok(());
    }

    println!("Composite: {}", report.composite);
    println!("Digest:    {}", report.digest);
    for (i, segment) in report.segments.iter().enumerate() {
        println!("  [{}] {}", i, segment);
    }
    Ok(())
}

fn cmd_history(config: &ToolkitConfig, raw: &str, now: Option<i64>) -> Result<(), String> {
    let now = now.unwrap_or_else(|| SystemClock.now_millis());
    let stored = entry::decode(raw);
    let window_ms = i64::try_from(config.dedup_window_ms)
        .map_err(|_| format!("dedup_window_ms out of range: {}", config.dedup_window_ms))?;

    if let Some(at) = stored.expires_at {
        let state = if stored.is_expired(now) { "expired" } else { "live" };
        println!("Stored expiry: {} ({})", gmt_string(at), state);
    }

    match VisitHistory::decode(stored.value, now, window_ms) {
        Decoded::Live(history) => {
            let start = history.window_start().unwrap_or(0);
            println!("Window start:  {} ({})", gmt_string(start), start);
            println!("Digests:       {}", history.len());
            for (i, digest) in history.hashes().iter().enumerate() {
                println!("  [{}] {}", i, digest);
            }
            Ok(())
        }
        Decoded::Expired => {
            println!("Window expired; the toolkit would purge this payload");
            Ok(())
        }
        Decoded::Malformed => Err(format!("Malformed history payload: {:?}", stored.value)),
    }
}

fn cmd_cookie_key(key: &str) -> Result<(), String> {
    if !is_valid_key(key) {
        return Err(format!("Invalid cookie key: {:?}", key));
    }
    println!("Valid cookie key: {}", key);
    Ok(())
}

fn cmd_beacon(
    config: &ToolkitConfig,
    identity: &str,
    url: &str,
    click: &str,
    cache_buster: bool,
) -> Result<(), String> {
    if identity.is_empty() {
        return Err("Identity must not be empty".to_string());
    }
    if click.is_empty() {
        return Err("Click parameter must not be empty; no beacon would be sent".to_string());
    }

    let beacon = visit_beacon_url(&config.record_url, click, url, identity);
    println!("{}", request_url(&beacon, !cache_buster, SystemClock.random()));
    Ok(())
}
