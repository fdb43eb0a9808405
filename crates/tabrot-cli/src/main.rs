//! `tabrot` — rotate, prune and inspect archive tables in a SQLite database.
//!
//! Meant to be run from a scheduler (cron, systemd timer). Only one scheduler
//! should rotate a given table at a time; nothing here locks across
//! processes.
//!
//! # Usage
//!
//! ```
//! tabrot --config tabrot.toml archive events
//! tabrot list events --count 3
//! tabrot query events --where "level = 'error'"
//! ```

mod settings;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use chrono::DateTime;
use clap::{Parser, Subcommand};
use serde_json::json;
use settings::Settings;
use tabrot_core::{PruneReport, naming};
use tabrot_store_sqlite::{SqliteArchiveManager, SqliteStore};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(author, version, about = "Rotate and prune archive tables")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "tabrot.toml")]
  config: PathBuf,

  /// SQLite database file; overrides `database` from the config.
  #[arg(long, env = "TABROT_DATABASE")]
  database: Option<PathBuf>,

  /// Print machine-readable JSON instead of text.
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Rotate TABLE into a new archive, then prune old archives.
  Archive { table: String },

  /// List archives of TABLE, newest first.
  List {
    table: String,
    /// Only the newest N archives.
    #[arg(long)]
    count: Option<usize>,
  },

  /// Count rows across TABLE and its archives.
  Query {
    table:     String,
    #[arg(long)]
    count:     Option<usize>,
    /// SQL predicate applied to every table.
    #[arg(long = "where")]
    predicate: Option<String>,
  },

  /// Apply the retention policy to TABLE without rotating.
  Prune { table: String },

  /// Report whether TABLE may be rotated now.
  Check { table: String },
}

// ─── Entry point ──────────────────────────────────────────────────────────────

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let settings = Settings::load(&cli.config, cli.database.as_deref())?;

  let store = SqliteStore::open(&settings.database)
    .with_context(|| format!("failed to open database at {:?}", settings.database))?;
  let manager = store.manager();

  match &cli.command {
    Command::Archive { table } => archive(&manager, &settings, table, cli.json),
    Command::List { table, count } => list(&manager, table, *count, cli.json),
    Command::Query { table, count, predicate } => {
      query(&manager, table, *count, predicate.as_deref(), cli.json)
    }
    Command::Prune { table } => {
      let report = manager
        .prune(table, &settings.rotation_for(table))
        .with_context(|| format!("failed to prune archives of {table}"))?;
      print_report(&report, cli.json);
      Ok(())
    }
    Command::Check { table } => {
      let cfg = settings.rotation_for(table);
      let ready = manager.can_rotate(table, cfg.min_interval_secs)?;
      if cli.json {
        println!("{}", json!({ "table": table, "can_rotate": ready }));
      } else if ready {
        println!("{table}: ready to archive");
      } else {
        println!("{table}: last archive is younger than {}s", cfg.min_interval_secs);
      }
      Ok(())
    }
  }
}

// ─── Commands ─────────────────────────────────────────────────────────────────

fn archive(
  manager: &SqliteArchiveManager,
  settings: &Settings,
  table: &str,
  as_json: bool,
) -> Result<()> {
  let rotation = manager
    .archive(table, &settings.rotation_for(table))
    .with_context(|| format!("failed to archive {table}"))?;

  if as_json {
    println!(
      "{}",
      json!({ "archive": rotation.archive, "pruned": report_json(&rotation.pruned) })
    );
  } else {
    println!("archived {table} to {}", rotation.archive.name);
    print_report(&rotation.pruned, false);
  }
  Ok(())
}

fn list(
  manager: &SqliteArchiveManager,
  table: &str,
  count: Option<usize>,
  as_json: bool,
) -> Result<()> {
  let mut listed = Vec::new();
  for archive in manager.list_archives(table, count)? {
    let timestamp = naming::decode(archive.name())?;
    let created = i64::try_from(timestamp)
      .ok()
      .and_then(|secs| DateTime::from_timestamp(secs, 0))
      .map(|dt| dt.to_rfc3339());
    listed.push(json!({
      "name":       archive.name(),
      "timestamp":  timestamp,
      "created_at": created,
      "rows":       archive.count()?,
    }));
  }

  if as_json {
    println!("{}", serde_json::Value::Array(listed));
  } else if listed.is_empty() {
    println!("{table} has no archives");
  } else {
    for entry in &listed {
      println!(
        "{}\t{}\t{} rows",
        entry["name"].as_str().unwrap_or_default(),
        entry["created_at"].as_str().unwrap_or("-"),
        entry["rows"]
      );
    }
  }
  Ok(())
}

fn query(
  manager: &SqliteArchiveManager,
  table: &str,
  count: Option<usize>,
  predicate: Option<&str>,
  as_json: bool,
) -> Result<()> {
  let counts = manager
    .with_archives(table, count, |t| {
      let rows = t.count_where(predicate.unwrap_or("1"), [])?;
      Ok::<_, anyhow::Error>((t.name().to_owned(), rows))
    })?
    .into_iter()
    .collect::<Result<Vec<_>>>()?;

  let total: u64 = counts.iter().map(|(_, n)| n).sum();
  if as_json {
    let tables: serde_json::Map<_, _> =
      counts.into_iter().map(|(name, n)| (name, json!(n))).collect();
    println!("{}", json!({ "tables": tables, "total": total }));
  } else {
    for (name, n) in &counts {
      println!("{name}\t{n}");
    }
    println!("total\t{total}");
  }
  Ok(())
}

// ─── Output ───────────────────────────────────────────────────────────────────

fn report_json(report: &PruneReport) -> serde_json::Value {
  let failures: Vec<_> = report
    .failures
    .iter()
    .map(|f| json!({ "table": f.table, "error": f.error.to_string() }))
    .collect();
  json!({ "dropped": report.dropped, "failures": failures })
}

fn print_report(report: &PruneReport, as_json: bool) {
  if as_json {
    println!("{}", report_json(report));
    return;
  }
  for table in &report.dropped {
    println!("dropped {table}");
  }
  for failure in &report.failures {
    eprintln!("failed to drop {}: {}", failure.table, failure.error);
  }
}
