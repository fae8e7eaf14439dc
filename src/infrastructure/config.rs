//! Configuration file management.
//!
//! Handles loading the TOML configuration and writing a commented default.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{AppConfig, Result, ZebraError};

/// Default configuration file content.
const DEFAULT_CONFIG: &str = r#"# zebra-usb configuration
# Auto-generated - edit as needed

[paths]
# Directory holding the lpX printer character devices
usb_device_dir = "/dev/usb"

# Udev rule written on first install
udev_rule_path = "/etc/udev/rules.d/99-zebra.rules"

# Environment file holding MFG_PRINTER / MFG_PRINTER_XXL
environment_file = "/etc/environment"

[timing]
list_timeout_secs = 7
read_timeout_secs = 1
reset_settle_ms = 100
print_settle_ms = 300
spooler_restart_secs = 2

[store]
# "environment" or "sqlite"
backend = "environment"
# sqlite_path = "/var/lib/zebra-usb/bindings.db"

[probe]
# Probe /dev/usb/lpX nodes concurrently
concurrent = false
"#;

/// Load configuration from `path`, or the default location if not given.
///
/// A missing default file yields the built-in defaults; a missing explicit
/// file is an error.
///
/// # Errors
/// Returns error if the file cannot be read or parsed.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = path {
        return load_config_from_file(path);
    }

    let config_path = AppConfig::default_config_path();
    if config_path.exists() {
        load_config_from_file(&config_path)
    } else {
        tracing::debug!(path = %config_path.display(), "No config file, using defaults");
        Ok(AppConfig::default())
    }
}

/// Load configuration from a specific file.
///
/// # Errors
/// Returns error if file cannot be read or parsed.
pub fn load_config_from_file(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        ZebraError::io(format!("Failed to read config file: {}", path.display()), e)
    })?;

    toml::from_str(&content).map_err(|e| ZebraError::Config {
        message: format!("Failed to parse config file: {e}"),
    })
}

/// Write the default configuration file if it doesn't exist yet.
///
/// # Errors
/// Returns error if file cannot be created.
pub fn ensure_config_exists(path: Option<&Path>) -> Result<PathBuf> {
    let config_path = path.map_or_else(AppConfig::default_config_path, Path::to_path_buf);

    if !config_path.exists() {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ZebraError::io("Failed to create config directory", e))?;
        }

        fs::write(&config_path, DEFAULT_CONFIG)
            .map_err(|e| ZebraError::io("Failed to create default config", e))?;

        tracing::info!(path = %config_path.display(), "Created default configuration");
    }

    Ok(config_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StoreBackend;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_parses() {
        let config: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.timing.list_timeout_secs, 7);
        assert_eq!(config.timing.read_timeout_secs, 1);
        assert_eq!(config.store.backend, StoreBackend::Environment);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[store]\nbackend = \"sqlite\"\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.timing.print_settle_ms, 300);
    }

    #[test]
    fn test_ensure_config_exists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let written = ensure_config_exists(Some(&path)).unwrap();
        assert_eq!(written, path);

        let loaded = load_config_from_file(&path).unwrap();
        assert_eq!(loaded.timing.spooler_restart_secs, 2);
    }

    #[test]
    fn test_missing_explicit_config_is_error() {
        let dir = tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
