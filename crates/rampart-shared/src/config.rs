//! Settings record.
//!
//! Loaded from `~/.backup_manager_config.json` or uses defaults. Missing keys
//! take their defaults; keys this version does not know are carried through
//! unchanged so a save never drops them.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{RampartError, Result};

/// Config file name inside the home directory
pub const CONFIG_FILE_NAME: &str = ".backup_manager_config.json";

/// Marker written by the backup script next to each local copy
pub const LATEST_BACKUP_MARKER: &str = "latest_backup.txt";

/// Default backup script file name, resolved next to the executable
pub const SCRIPT_FILE_NAME: &str = "backup_manager_script.sh";

/// Keys `Settings::set_value` accepts
pub const SETTABLE_KEYS: &[&str] = &[
    "auto_start",
    "max_backup_size_gb",
    "max_snapshots",
    "refresh_interval",
    "theme",
    "script_path",
    "remote_mount_point",
    "snapshot_marker",
    "snapshot_command",
    "mount_helper",
    "remote_auth_command",
    "probe_timeout_secs",
    "action_timeout_secs",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Run a backup shortly after startup
    #[serde(default = "default_auto_start")]
    pub auto_start: bool,

    /// Directory holding local copies and `latest_backup.txt`
    #[serde(default = "default_local_backup_path")]
    pub local_backup_path: PathBuf,

    #[serde(default = "default_max_backup_size_gb")]
    pub max_backup_size_gb: u64,

    #[serde(default = "default_max_snapshots")]
    pub max_snapshots: u32,

    /// Seconds between periodic probe cycles
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,

    #[serde(default = "default_theme")]
    pub theme: String,

    /// External backup script
    #[serde(default = "default_script_path")]
    pub script_path: PathBuf,

    /// Directory the remote storage is mounted on
    #[serde(default = "default_remote_mount_point")]
    pub remote_mount_point: PathBuf,

    /// Marker file the snapshot tool leaves after a snapshot
    #[serde(default = "default_snapshot_marker")]
    pub snapshot_marker: PathBuf,

    /// Non-interactive snapshot listing command
    #[serde(default = "default_snapshot_command")]
    pub snapshot_command: Vec<String>,

    /// FUSE helper that must be installed before mounting
    #[serde(default = "default_mount_helper")]
    pub mount_helper: String,

    /// Optional command that (re)authorizes the remote storage
    #[serde(default)]
    pub remote_auth_command: Option<Vec<String>>,

    /// Per-probe timeout in seconds
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Timeout for a whole script invocation in seconds
    #[serde(default = "default_action_timeout")]
    pub action_timeout_secs: u64,

    /// Keys written by other tools or newer versions
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("/"))
}

fn default_auto_start() -> bool {
    true
}

fn default_local_backup_path() -> PathBuf {
    home_dir().join("Local_Backups")
}

fn default_max_backup_size_gb() -> u64 {
    4
}

fn default_max_snapshots() -> u32 {
    10
}

fn default_refresh_interval() -> u64 {
    30
}

fn default_theme() -> String {
    "modern".to_string()
}

fn default_script_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(SCRIPT_FILE_NAME)))
        .unwrap_or_else(|| PathBuf::from(SCRIPT_FILE_NAME))
}

fn default_remote_mount_point() -> PathBuf {
    home_dir().join("GoogleDrive")
}

fn default_snapshot_marker() -> PathBuf {
    home_dir().join("Timeshift_Snapshots").join("latest_snapshot.txt")
}

fn default_snapshot_command() -> Vec<String> {
    // -n: fail instead of prompting; privileges come from sudoers, never from us
    ["sudo", "-n", "timeshift", "--list"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_mount_helper() -> String {
    "google-drive-ocamlfuse".to_string()
}

fn default_probe_timeout() -> u64 {
    10
}

fn default_action_timeout() -> u64 {
    300
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_start: default_auto_start(),
            local_backup_path: default_local_backup_path(),
            max_backup_size_gb: default_max_backup_size_gb(),
            max_snapshots: default_max_snapshots(),
            refresh_interval: default_refresh_interval(),
            theme: default_theme(),
            script_path: default_script_path(),
            remote_mount_point: default_remote_mount_point(),
            snapshot_marker: default_snapshot_marker(),
            snapshot_command: default_snapshot_command(),
            mount_helper: default_mount_helper(),
            remote_auth_command: None,
            probe_timeout_secs: default_probe_timeout(),
            action_timeout_secs: default_action_timeout(),
            extra: serde_json::Map::new(),
        }
    }
}

impl Settings {
    /// Default config location in the home directory
    pub fn default_path() -> PathBuf {
        home_dir().join(CONFIG_FILE_NAME)
    }

    /// Load settings, never failing.
    ///
    /// A missing file yields defaults, which are written out for next time.
    /// An unreadable or malformed file yields defaults and is left untouched.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            let settings = Settings::default();
            if let Err(e) = settings.save(path) {
                warn!("Could not write default config to {}: {}", path.display(), e);
            }
            return settings;
        }

        Self::load_from_path(path).unwrap_or_else(|e| {
            warn!("Config unreadable, using defaults: {}", e);
            Settings::default()
        })
    }

    /// Load from a specific path, surfacing faults
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let settings = Self::from_json(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(settings)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        if !value.is_object() {
            return Err(RampartError::Config("top level must be an object".to_string()));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Write as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        info!("Saved config to {}", path.display());
        Ok(())
    }

    pub fn refresh_every(&self) -> Duration {
        Duration::from_secs(self.refresh_interval.max(1))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs.max(1))
    }

    pub fn action_timeout(&self) -> Duration {
        Duration::from_secs(self.action_timeout_secs.max(1))
    }

    /// `{local_backup_path}/latest_backup.txt`
    pub fn latest_backup_marker(&self) -> PathBuf {
        self.local_backup_path.join(LATEST_BACKUP_MARKER)
    }

    /// Set one key from its text form, checking the value fits the key.
    ///
    /// Commands are split on whitespace; `remote_auth_command` accepts
    /// `none` to unset it. `local_backup_path` is refused here because a new
    /// location has to be checked for existence and free space first.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "auto_start" => self.auto_start = parse_value(key, value)?,
            "max_backup_size_gb" => self.max_backup_size_gb = parse_value(key, value)?,
            "max_snapshots" => self.max_snapshots = parse_value(key, value)?,
            "refresh_interval" => self.refresh_interval = parse_seconds(key, value)?,
            "probe_timeout_secs" => self.probe_timeout_secs = parse_seconds(key, value)?,
            "action_timeout_secs" => self.action_timeout_secs = parse_seconds(key, value)?,
            "theme" => self.theme = non_empty(key, value)?.to_string(),
            "mount_helper" => self.mount_helper = non_empty(key, value)?.to_string(),
            "script_path" => self.script_path = PathBuf::from(non_empty(key, value)?),
            "remote_mount_point" => self.remote_mount_point = PathBuf::from(non_empty(key, value)?),
            "snapshot_marker" => self.snapshot_marker = PathBuf::from(non_empty(key, value)?),
            "snapshot_command" => self.snapshot_command = split_command(non_empty(key, value)?),
            "remote_auth_command" => {
                self.remote_auth_command = match value {
                    "" | "none" | "null" => None,
                    command => Some(split_command(command)),
                }
            }
            "local_backup_path" => {
                return Err(RampartError::Config(
                    "local_backup_path is changed with set-path".to_string(),
                ))
            }
            other => {
                return Err(RampartError::Config(format!(
                    "unknown setting {} (settable: {})",
                    other,
                    SETTABLE_KEYS.join(", ")
                )))
            }
        }
        Ok(())
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        RampartError::Config(format!(
            "invalid value {:?} for {} (expected {})",
            value,
            key,
            std::any::type_name::<T>()
        ))
    })
}

fn parse_seconds(key: &str, value: &str) -> Result<u64> {
    match parse_value::<u64>(key, value)? {
        0 => Err(RampartError::Config(format!("{} must be at least 1 second", key))),
        secs => Ok(secs),
    }
}

fn non_empty<'a>(key: &str, value: &'a str) -> Result<&'a str> {
    if value.is_empty() {
        return Err(RampartError::Config(format!("{} cannot be empty", key)));
    }
    Ok(value)
}

fn split_command(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert!(settings.auto_start);
        assert_eq!(settings.max_backup_size_gb, 4);
        assert_eq!(settings.max_snapshots, 10);
        assert_eq!(settings.refresh_interval, 30);
        assert_eq!(settings.theme, "modern");
        assert!(settings.local_backup_path.ends_with("Local_Backups"));
        assert_eq!(settings.snapshot_command[..2], ["sudo".to_string(), "-n".to_string()]);
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let settings = Settings::from_json(r#"{"refresh_interval": 5, "theme": "dark"}"#).unwrap();
        assert_eq!(settings.refresh_interval, 5);
        assert_eq!(settings.theme, "dark");
        assert_eq!(settings.max_snapshots, 10);
        assert!(settings.extra.is_empty());
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(Settings::from_json("[1, 2]").is_err());
        assert!(Settings::from_json("not json").is_err());
    }

    #[test]
    fn test_marker_path() {
        let settings = Settings {
            local_backup_path: PathBuf::from("/srv/backups"),
            ..Settings::default()
        };
        assert_eq!(
            settings.latest_backup_marker(),
            PathBuf::from("/srv/backups/latest_backup.txt")
        );
    }

    #[test]
    fn test_set_value_checks_types() {
        let mut settings = Settings::default();
        settings.set_value("auto_start", "false").unwrap();
        settings.set_value("max_snapshots", " 25 ").unwrap();
        settings.set_value("remote_auth_command", "google-drive-ocamlfuse -headless").unwrap();
        assert!(!settings.auto_start);
        assert_eq!(settings.max_snapshots, 25);
        assert_eq!(
            settings.remote_auth_command,
            Some(vec!["google-drive-ocamlfuse".to_string(), "-headless".to_string()])
        );

        settings.set_value("remote_auth_command", "none").unwrap();
        assert_eq!(settings.remote_auth_command, None);

        let before = settings.clone();
        assert!(settings.set_value("auto_start", "sometimes").is_err());
        assert!(settings.set_value("max_backup_size_gb", "-3").is_err());
        assert!(settings.set_value("refresh_interval", "0").is_err());
        assert!(settings.set_value("theme", "  ").is_err());
        assert!(settings.set_value("local_backup_path", "/tmp").is_err());
        assert!(settings.set_value("window_geometry", "800x600").is_err());
        assert_eq!(settings, before);
    }

    #[test]
    fn test_zero_intervals_are_clamped() {
        let settings = Settings {
            refresh_interval: 0,
            probe_timeout_secs: 0,
            ..Settings::default()
        };
        assert_eq!(settings.refresh_every(), Duration::from_secs(1));
        assert_eq!(settings.probe_timeout(), Duration::from_secs(1));
    }
}
