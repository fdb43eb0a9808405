//! Settings loaded from `tabrot.toml` and `TABROT_*` environment variables.
//!
//! ```toml
//! database = "~/data/app.sqlite"
//!
//! [defaults]
//! min_interval_secs = 86400
//! retention = { kind = "max_count", max_count = 3 }
//!
//! [tables.events]
//! retention = { kind = "max_age", max_age_secs = 2592000 }
//! prune_mode = "best_effort"
//! ```

use std::{
  collections::HashMap,
  path::{Path, PathBuf},
};

use anyhow::Context as _;
use serde::Deserialize;
use tabrot_core::{PruneMode, RetentionPolicy, RotationConfig};

#[derive(Debug, Deserialize)]
pub struct Settings {
  pub database: PathBuf,
  #[serde(default)]
  pub defaults: RotationConfig,
  #[serde(default)]
  pub tables:   HashMap<String, TableOverride>,
}

/// Per-table settings. Unset fields fall back to `[defaults]`.
#[derive(Debug, Default, Deserialize)]
pub struct TableOverride {
  pub retention:         Option<RetentionPolicy>,
  pub min_interval_secs: Option<u64>,
  pub prune_mode:        Option<PruneMode>,
}

impl Settings {
  /// Layer the optional file at `path` under `TABROT_*` environment
  /// variables, with `database` (if given) overriding both.
  pub fn load(path: &Path, database: Option<&Path>) -> anyhow::Result<Self> {
    Self::load_from(path, database, environment())
  }

  fn load_from(
    path: &Path,
    database: Option<&Path>,
    env: config::Environment,
  ) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(env)
      .set_override_option(
        "database",
        database.map(|p| p.to_string_lossy().into_owned()),
      )?
      .build()
      .context("failed to read config file")?;

    let mut settings: Self = settings
      .try_deserialize()
      .context("failed to deserialise settings")?;
    settings.database = expand_tilde(&settings.database);
    Ok(settings)
  }

  /// Effective rotation settings for `table`.
  pub fn rotation_for(&self, table: &str) -> RotationConfig {
    let mut cfg = self.defaults;
    if let Some(o) = self.tables.get(table) {
      if let Some(retention) = o.retention {
        cfg.retention = retention;
      }
      if let Some(secs) = o.min_interval_secs {
        cfg.min_interval_secs = secs;
      }
      if let Some(mode) = o.prune_mode {
        cfg.prune_mode = mode;
      }
    }
    cfg
  }
}

/// `TABROT_DATABASE`, `TABROT_DEFAULTS__MIN_INTERVAL_SECS`, and so on: a
/// single `_` after the prefix, `__` between nested keys.
fn environment() -> config::Environment {
  config::Environment::with_prefix("TABROT")
    .prefix_separator("_")
    .separator("__")
    .try_parsing(true)
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn from_toml(toml: &str) -> Settings {
    config::Config::builder()
      .add_source(config::File::from_str(toml, config::FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap()
  }

  #[test]
  fn table_overrides_fall_back_to_defaults() {
    let settings = from_toml(
      r#"
      database = "app.sqlite"

      [defaults]
      min_interval_secs = 60
      retention = { kind = "max_count", max_count = 5 }

      [tables.events]
      prune_mode = "best_effort"
      "#,
    );

    let events = settings.rotation_for("events");
    assert_eq!(events.min_interval_secs, 60);
    assert_eq!(events.retention, RetentionPolicy::MaxCount { max_count: 5 });
    assert_eq!(events.prune_mode, PruneMode::BestEffort);

    assert_eq!(settings.rotation_for("other").prune_mode, PruneMode::FailFast);
  }

  #[test]
  fn environment_variables_use_single_underscore_after_prefix() {
    let vars: config::Map<String, String> = [
      ("TABROT_DATABASE", "from_env.sqlite"),
      ("TABROT_DEFAULTS__MIN_INTERVAL_SECS", "5"),
      ("TABROT_TABLES__EVENTS__PRUNE_MODE", "best_effort"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_owned(), v.to_owned()))
    .collect();

    let settings = Settings::load_from(
      Path::new("does-not-exist.toml"),
      None,
      environment().source(Some(vars)),
    )
    .unwrap();

    assert_eq!(settings.database, PathBuf::from("from_env.sqlite"));
    assert_eq!(settings.rotation_for("any").min_interval_secs, 5);
    assert_eq!(settings.rotation_for("events").prune_mode, PruneMode::BestEffort);
  }

  #[test]
  fn database_flag_overrides_environment() {
    let vars: config::Map<String, String> =
      [("TABROT_DATABASE".to_owned(), "from_env.sqlite".to_owned())].into();

    let settings = Settings::load_from(
      Path::new("does-not-exist.toml"),
      Some(Path::new("flag.sqlite")),
      environment().source(Some(vars)),
    )
    .unwrap();

    assert_eq!(settings.database, PathBuf::from("flag.sqlite"));
  }

  #[test]
  fn missing_sections_use_built_in_defaults() {
    let settings = from_toml(r#"database = "app.sqlite""#);
    assert_eq!(settings.rotation_for("any"), RotationConfig::default());
  }
}
