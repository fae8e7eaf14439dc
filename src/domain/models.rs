//! Domain models for printer identity and device replies.
//!
//! The serial number is the only key shared by CUPS, `lpinfo` and udev, so
//! every type here is anchored on it.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use super::error::{Result, ZebraError};

/// Exit status `timeout(1)` reports when it had to stop the command.
pub const TIMEOUT_EXIT_STATUS: i32 = 124;

/// Which logical slot a printer is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular label printer.
    Primary,
    /// Supplementary (packout only) label printer.
    Supplementary,
}

impl Role {
    /// Both roles, primary first.
    pub const ALL: [Self; 2] = [Self::Primary, Self::Supplementary];

    /// Environment key the binding is stored under.
    #[must_use]
    pub const fn env_key(self) -> &'static str {
        match self {
            Self::Primary => "MFG_PRINTER",
            Self::Supplementary => "MFG_PRINTER_XXL",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Supplementary => write!(f, "supplementary"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "primary" | "regular" | "r" => Ok(Self::Primary),
            "supplementary" | "xxl" | "s" => Ok(Self::Supplementary),
            _ => Err(format!("Unknown role: {s}. Use: primary, supplementary")),
        }
    }
}

/// USB vendor/product pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UsbId {
    pub vendor: u16,
    pub product: u16,
}

impl UsbId {
    /// Parse two 4-hex-digit strings.
    #[must_use]
    pub fn from_hex(vendor: &str, product: &str) -> Option<Self> {
        let parse = |s: &str| {
            if s.len() == 4 && s.chars().all(|c| c.is_ascii_hexdigit()) {
                u16::from_str_radix(s, 16).ok()
            } else {
                None
            }
        };

        Some(Self {
            vendor: parse(vendor)?,
            product: parse(product)?,
        })
    }

    /// Vendor id as 4 lowercase hex digits.
    #[must_use]
    pub fn vendor_hex(&self) -> String {
        format!("{:04x}", self.vendor)
    }

    /// Product id as 4 lowercase hex digits.
    #[must_use]
    pub fn product_hex(&self) -> String {
        format!("{:04x}", self.product)
    }
}

impl std::fmt::Display for UsbId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor, self.product)
    }
}

/// Persisted role binding value: `serial-VID-PID`, or a bare serial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub serial: String,
    pub usb_id: Option<UsbId>,
}

impl Binding {
    /// Create a binding for a serial with optional ids.
    pub fn new(serial: impl Into<String>, usb_id: Option<UsbId>) -> Self {
        Self {
            serial: serial.into(),
            usb_id,
        }
    }

    /// Parse a stored binding value.
    ///
    /// # Errors
    /// Returns error if the serial part is empty.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim().trim_matches('"');

        let mut parts = value.rsplitn(3, '-');
        let (pid, vid, serial) = (parts.next(), parts.next(), parts.next());

        let binding = match (serial, vid, pid) {
            (Some(serial), Some(vid), Some(pid)) => match UsbId::from_hex(vid, pid) {
                Some(id) => Self::new(serial, Some(id)),
                None => Self::new(value, None),
            },
            _ => Self::new(value, None),
        };

        if binding.serial.is_empty() {
            return Err(ZebraError::InvalidBinding {
                value: value.to_string(),
            });
        }

        Ok(binding)
    }
}

impl std::fmt::Display for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.usb_id {
            Some(id) => write!(f, "{}-{}-{}", self.serial, id.vendor_hex(), id.product_hex()),
            None => write!(f, "{}", self.serial),
        }
    }
}

/// Resolved identity of one physical printer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrinterIdentity {
    /// USB descriptor serial number.
    pub serial: String,
    /// Vendor/product ids, when known.
    #[serde(serialize_with = "serialize_usb_id")]
    pub usb_id: Option<UsbId>,
    /// CUPS queue name; empty until installed.
    pub queue_name: String,
    /// `/dev/usb/lpX` node, when the kernel exposes one.
    pub device_path: Option<PathBuf>,
}

fn serialize_usb_id<S: serde::Serializer>(
    id: &Option<UsbId>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match id {
        Some(id) => serializer.serialize_some(&id.to_string()),
        None => serializer.serialize_none(),
    }
}

impl PrinterIdentity {
    /// The binding this identity would be stored as.
    #[must_use]
    pub fn binding(&self) -> Binding {
        Binding::new(self.serial.clone(), self.usb_id)
    }
}

/// A Zebra printer seen on the USB bus during one enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectedPrinter {
    pub serial: String,
    pub uri: String,
    pub device_path: Option<PathBuf>,
    pub model: String,
    pub installed: Option<Role>,
}

/// Outcome of the bounded read-back from the device node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// Reader exited on its own (stream closed).
    Closed,
    /// Reader was stopped by the timeout after collecting whatever arrived.
    TimedOut,
    /// Reader failed with this exit status.
    Failed(i32),
}

impl ReadStatus {
    /// Classify a raw exit status from `timeout <n> cat`.
    #[must_use]
    pub const fn from_exit(status: i32) -> Self {
        match status {
            0 => Self::Closed,
            TIMEOUT_EXIT_STATUS => Self::TimedOut,
            other => Self::Failed(other),
        }
    }
}

/// Reply captured from one command/response exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceReply {
    pub raw_status: i32,
    pub status: ReadStatus,
    pub response: String,
    pub error: String,
}

/// Single value from the printer's configuration dump.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SettingValue {
    Number(f64),
    Text(String),
}

impl SettingValue {
    /// Parse as a number when possible, otherwise keep the text.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        raw.parse::<f64>()
            .map_or_else(|_| Self::Text(raw.to_string()), Self::Number)
    }
}

impl std::fmt::Display for SettingValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(t) => write!(f, "{t}"),
        }
    }
}

/// Printer configuration keyed by label.
pub type PrinterSettings = BTreeMap<String, SettingValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_with_ids() {
        let binding = Binding::parse("18J194403879-0a5f-0120").unwrap();
        assert_eq!(binding.serial, "18J194403879");
        assert_eq!(
            binding.usb_id,
            Some(UsbId {
                vendor: 0x0a5f,
                product: 0x0120
            })
        );
        assert_eq!(binding.to_string(), "18J194403879-0a5f-0120");
    }

    #[test]
    fn test_binding_bare_serial() {
        let binding = Binding::parse("\"JAG008676\"").unwrap();
        assert_eq!(binding.serial, "JAG008676");
        assert!(binding.usb_id.is_none());

        assert!(Binding::parse("").is_err());
    }

    #[test]
    fn test_binding_dashed_serial_without_ids() {
        let binding = Binding::parse("AB-CD-EF").unwrap();
        assert_eq!(binding.serial, "AB-CD-EF");
        assert!(binding.usb_id.is_none());
    }

    #[test]
    fn test_read_status() {
        assert_eq!(ReadStatus::from_exit(124), ReadStatus::TimedOut);
        assert_eq!(ReadStatus::from_exit(0), ReadStatus::Closed);
        assert_eq!(ReadStatus::from_exit(1), ReadStatus::Failed(1));
    }

    #[test]
    fn test_setting_value() {
        assert_eq!(SettingValue::parse("+10.0"), SettingValue::Number(10.0));
        assert_eq!(
            SettingValue::parse(" TEAR OFF "),
            SettingValue::Text("TEAR OFF".into())
        );
    }

    #[test]
    fn test_role_keys() {
        assert_eq!(Role::Primary.env_key(), "MFG_PRINTER");
        assert_eq!(Role::Supplementary.env_key(), "MFG_PRINTER_XXL");
        assert_eq!("S".parse::<Role>().unwrap(), Role::Supplementary);
    }
}
