//! Server configuration – reads/writes `~/.iris/gate.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Persisted server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database holding gate arms, arrays and the event log.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// The system can only be enabled while this file exists and is
    /// writable.  Disabling deletes it.
    #[serde(default = "default_enable_file")]
    pub enable_file: Option<PathBuf>,

    /// CIDR blocks allowed to request gate arm state changes.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    #[serde(default = "default_comm_fail_timeout_sec")]
    pub comm_fail_timeout_sec: u64,

    #[serde(default = "default_sweep_period_ms")]
    pub sweep_period_ms: u64,
}

fn home_dir() -> PathBuf {
    PathBuf::from(
        std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

fn default_db_path() -> PathBuf {
    home_dir().join(".iris").join("iris.db")
}
fn default_enable_file() -> Option<PathBuf> {
    Some(PathBuf::from("/var/lib/iris/gate_arm_enable"))
}
fn default_allowed_origins() -> Vec<String> {
    vec!["127.0.0.1/32".to_string(), "::1/128".to_string()]
}
fn default_comm_fail_timeout_sec() -> u64 {
    30
}
fn default_sweep_period_ms() -> u64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            enable_file: default_enable_file(),
            allowed_origins: default_allowed_origins(),
            comm_fail_timeout_sec: default_comm_fail_timeout_sec(),
            sweep_period_ms: default_sweep_period_ms(),
        }
    }
}

impl Config {
    pub fn comm_fail_timeout(&self) -> Duration {
        Duration::from_secs(self.comm_fail_timeout_sec)
    }

    /// Sweep period, never shorter than 10 ms.
    pub fn sweep_period(&self) -> Duration {
        Duration::from_millis(self.sweep_period_ms.max(10))
    }
}

/// `$IRIS_CONFIG`, or `~/.iris/gate.toml`.
pub fn config_path() -> PathBuf {
    match std::env::var("IRIS_CONFIG") {
        Ok(p) if !p.is_empty() => PathBuf::from(p),
        _ => config_path_for_home(&home_dir()),
    }
}

pub(crate) fn config_path_for_home(home: &Path) -> PathBuf {
    home.join(".iris").join("gate.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `IRIS_*` environment overrides.  Unparsable numbers are ignored.
///
/// | Variable | Config field |
/// |---|---|
/// | `IRIS_DB_PATH` | `db_path` |
/// | `IRIS_ENABLE_FILE` | `enable_file` |
/// | `IRIS_COMM_FAIL_TIMEOUT_SEC` | `comm_fail_timeout_sec` |
/// | `IRIS_SWEEP_PERIOD_MS` | `sweep_period_ms` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("IRIS_DB_PATH") {
        cfg.db_path = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("IRIS_ENABLE_FILE") {
        cfg.enable_file = Some(PathBuf::from(v));
    }
    if let Ok(v) = std::env::var("IRIS_COMM_FAIL_TIMEOUT_SEC")
        && let Ok(secs) = v.parse::<u64>()
    {
        cfg.comm_fail_timeout_sec = secs;
    }
    if let Ok(v) = std::env::var("IRIS_SWEEP_PERIOD_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.sweep_period_ms = ms;
    }
}

pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Write the config with owner-only permissions on Unix.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
