/// Application configuration: persisted as TOML in the config directory.
///
/// The config directory is `$BATTLE_NOTIFY_HOME` when set, otherwise
/// `<temp dir>/battle-notify`. It holds:
///   config.toml    this file
///   rules/         rule files, one per scope (default `rules_dir`)
///   logs/          daily rolling log files (default `log_dir`)
///
/// Relative `rules_dir` / `log_dir` values resolve against the config directory.
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const HOME_ENV: &str = "BATTLE_NOTIFY_HOME";

const CONFIG_FILE: &str = "config.toml";

// ---------------------------------------------------------------------------
// AppConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Interval between rule evaluations, in milliseconds
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    #[serde(default = "default_rules_dir")]
    pub rules_dir: PathBuf,

    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Reload the rule set when a rule file changes on disk
    #[serde(default = "default_watch_rules")]
    pub watch_rules: bool,

    /// Notifications queued for the sink before new ones are dropped
    #[serde(default = "default_notification_buffer")]
    pub notification_buffer: usize,
}

fn default_tick_ms() -> u64 { 500 }
fn default_rules_dir() -> PathBuf { PathBuf::from("rules") }
fn default_log_dir() -> PathBuf { PathBuf::from("logs") }
fn default_watch_rules() -> bool { true }
fn default_notification_buffer() -> usize { 128 }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tick_ms:             default_tick_ms(),
            rules_dir:           default_rules_dir(),
            log_dir:             default_log_dir(),
            watch_rules:         default_watch_rules(),
            notification_buffer: default_notification_buffer(),
        }
    }
}

impl AppConfig {
    pub fn tick(&self) -> Duration {
        // A zero interval would make tokio::time::interval panic
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn rules_path(&self, config_dir: &Path) -> PathBuf {
        config_dir.join(&self.rules_dir)
    }

    pub fn log_path(&self, config_dir: &Path) -> PathBuf {
        config_dir.join(&self.log_dir)
    }
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

pub fn config_dir() -> PathBuf {
    std::env::var_os(HOME_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("battle-notify"))
}

pub fn load_or_default(config_dir: &Path) -> Result<AppConfig> {
    let path = config_dir.join(CONFIG_FILE);
    if path.exists() {
        let raw = std::fs::read_to_string(&path)?;
        let cfg: AppConfig = toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("Config parse error in {:?}: {}", path, e))?;
        Ok(cfg)
    } else {
        Ok(AppConfig::default())
    }
}

pub fn save(config: &AppConfig, config_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(config_dir)?;
    let raw = toml::to_string_pretty(config)
        .map_err(|e| anyhow::anyhow!("Config serialize error: {}", e))?;
    std::fs::write(config_dir.join(CONFIG_FILE), raw)?;
    Ok(())
}

/// First run writes the defaults out so there is a file to edit.
pub fn load_or_init(config_dir: &Path) -> Result<AppConfig> {
    let cfg = load_or_default(config_dir)?;
    if !config_dir.join(CONFIG_FILE).exists() {
        save(&cfg, config_dir)?;
    }
    Ok(cfg)
}
