//! Output formatting for printer listings and configuration dumps.
//!
//! Supports a human table view and JSON for scripts.

use std::collections::BTreeMap;

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};
use serde::Serialize;

use crate::domain::{ConnectedPrinter, PrinterSettings};

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Table view.
    #[default]
    Table,
    /// JSON format for programmatic use.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {s}. Use: table, json")),
        }
    }
}

/// Pretty JSON for any serializable value.
///
/// # Errors
/// Returns error if serialization fails.
pub fn format_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}

/// Formats connected printers as a table.
pub fn format_connected_table(printers: &BTreeMap<String, ConnectedPrinter>) -> String {
    if printers.is_empty() {
        return "No Zebra printers connected.".yellow().to_string();
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Serial", "Model", "Device", "Role", "URI"]);

    for printer in printers.values() {
        table.add_row(vec![
            printer.serial.clone(),
            if printer.model.is_empty() {
                "-".to_string()
            } else {
                printer.model.clone()
            },
            printer
                .device_path
                .as_ref()
                .map_or_else(|| "-".to_string(), |p| p.display().to_string()),
            printer
                .installed
                .map_or_else(|| "not installed".to_string(), |r| r.to_string()),
            printer.uri.clone(),
        ]);
    }

    table.to_string()
}

/// Formats installed queues as a table.
pub fn format_installed_table(queues: &BTreeMap<String, String>) -> String {
    if queues.is_empty() {
        return "No Zebra queues installed.".yellow().to_string();
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Queue", "URI"]);

    for (name, uri) in queues {
        table.add_row(vec![name.as_str(), uri.as_str()]);
    }

    table.to_string()
}

/// Formats a configuration dump as a table.
pub fn format_settings_table(settings: &PrinterSettings) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Setting", "Value"]);

    for (label, value) in settings {
        table.add_row(vec![label.clone(), value.to_string()]);
    }

    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Role, SettingValue};
    use std::path::PathBuf;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("markdown".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_connected_table_and_json() {
        let mut printers = BTreeMap::new();
        printers.insert(
            "ABC123".to_string(),
            ConnectedPrinter {
                serial: "ABC123".into(),
                uri: "usb://Zebra%20Technologies/ZTC%20ZT410?serial=ABC123".into(),
                device_path: Some(PathBuf::from("/dev/usb/lp0")),
                model: "ZTC ZT410".into(),
                installed: Some(Role::Supplementary),
            },
        );

        let table = format_connected_table(&printers);
        assert!(table.contains("ABC123"));
        assert!(table.contains("/dev/usb/lp0"));
        assert!(table.contains("supplementary"));

        let json = format_json(&printers).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["ABC123"]["installed"], "supplementary");
        assert_eq!(value["ABC123"]["device_path"], "/dev/usb/lp0");
    }

    #[test]
    fn test_settings_json_keeps_numbers() {
        let mut settings = PrinterSettings::new();
        settings.insert("DARKNESS".into(), SettingValue::Number(20.0));
        settings.insert("PRINT MODE".into(), SettingValue::Text("TEAR OFF".into()));

        let value: serde_json::Value =
            serde_json::from_str(&format_json(&settings).unwrap()).unwrap();
        assert_eq!(value["DARKNESS"], 20.0);
        assert_eq!(value["PRINT MODE"], "TEAR OFF");

        assert!(format_settings_table(&settings).contains("TEAR OFF"));
    }
}
