//! Runtime configuration.
//!
//! Every field has a default matching a stock CUPS/udev Linux host, so an
//! absent or partial config file is fine.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Filesystem locations the tool reads and writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    /// Directory holding the `lpX` character devices.
    #[serde(default = "default_usb_device_dir")]
    pub usb_device_dir: PathBuf,

    /// Udev rule granting access to the printer's vendor id.
    #[serde(default = "default_udev_rule_path")]
    pub udev_rule_path: PathBuf,

    /// File the environment binding store writes to.
    #[serde(default = "default_environment_file")]
    pub environment_file: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            usb_device_dir: default_usb_device_dir(),
            udev_rule_path: default_udev_rule_path(),
            environment_file: default_environment_file(),
        }
    }
}

fn default_usb_device_dir() -> PathBuf {
    PathBuf::from("/dev/usb")
}

fn default_udev_rule_path() -> PathBuf {
    PathBuf::from("/etc/udev/rules.d/99-zebra.rules")
}

fn default_environment_file() -> PathBuf {
    PathBuf::from("/etc/environment")
}

/// Timeouts and settle intervals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Upper bound for CUPS/udev listing commands.
    #[serde(default = "default_list_timeout")]
    pub list_timeout_secs: u64,

    /// Read-back window after writing to the device node.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,

    /// Pause between the reset sequence and the payload.
    #[serde(default = "default_reset_settle")]
    pub reset_settle_ms: u64,

    /// Pause between cancelling jobs and submitting a new one.
    #[serde(default = "default_print_settle")]
    pub print_settle_ms: u64,

    /// Pause after restarting the CUPS service.
    #[serde(default = "default_spooler_restart")]
    pub spooler_restart_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            list_timeout_secs: default_list_timeout(),
            read_timeout_secs: default_read_timeout(),
            reset_settle_ms: default_reset_settle(),
            print_settle_ms: default_print_settle(),
            spooler_restart_secs: default_spooler_restart(),
        }
    }
}

const fn default_list_timeout() -> u64 {
    7
}

const fn default_read_timeout() -> u64 {
    1
}

const fn default_reset_settle() -> u64 {
    100
}

const fn default_print_settle() -> u64 {
    300
}

const fn default_spooler_restart() -> u64 {
    2
}

impl TimingConfig {
    #[must_use]
    pub const fn list_timeout(&self) -> Duration {
        Duration::from_secs(self.list_timeout_secs)
    }

    #[must_use]
    pub const fn reset_settle(&self) -> Duration {
        Duration::from_millis(self.reset_settle_ms)
    }

    #[must_use]
    pub const fn print_settle(&self) -> Duration {
        Duration::from_millis(self.print_settle_ms)
    }

    #[must_use]
    pub const fn spooler_restart(&self) -> Duration {
        Duration::from_secs(self.spooler_restart_secs)
    }

    /// Hard limit for the read-back process itself; `timeout(1)` inside it
    /// should always fire first.
    #[must_use]
    pub const fn read_guard(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs + 2)
    }
}

/// Where role bindings are persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// `KEY="value"` lines in the environment file.
    #[default]
    Environment,
    /// SQLite database.
    Sqlite,
}

/// Binding store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Database path for the sqlite backend.
    #[serde(default)]
    pub sqlite_path: Option<PathBuf>,
}

impl StoreConfig {
    /// Database path, defaulting under the user data directory.
    #[must_use]
    pub fn sqlite_path(&self) -> PathBuf {
        self.sqlite_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("zebra-usb")
                .join("bindings.db")
        })
    }
}

/// Device-node probing behaviour.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Probe `lpX` nodes concurrently instead of one by one.
    #[serde(default)]
    pub concurrent: bool,
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub paths: PathConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub probe: ProbeConfig,
}

impl AppConfig {
    /// Default config file location.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("zebra-usb")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.timing.list_timeout(), Duration::from_secs(7));
        assert_eq!(config.timing.reset_settle(), Duration::from_millis(100));
        assert_eq!(config.timing.print_settle(), Duration::from_millis(300));
        assert_eq!(config.paths.usb_device_dir, PathBuf::from("/dev/usb"));
        assert_eq!(config.store.backend, StoreBackend::Environment);
        assert!(!config.probe.concurrent);
    }
}
