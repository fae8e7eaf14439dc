//! Parsers for the text that CUPS, udev, `lsusb` and the printer print.
//!
//! Each grammar is a line filter plus a capture, kept free of I/O so it can
//! be checked against captured output.

use crate::domain::{PrinterSettings, SettingValue, UsbId};

/// Tokens that mark a Zebra queue in `lpstat -v` output.
pub const INSTALLED_MARKERS: &[&str] = &["Zebra", "ZTC", "ZPL"];

/// Token that marks a Zebra device in `lpinfo` and `lsusb` output.
pub const CONNECTED_MARKER: &str = "Zebra";

const USB_SCHEME: &str = "usb://";
const DEVICE_FOR: &str = "device for ";

/// `usb://...` up to the next whitespace.
#[must_use]
pub fn usb_uri(line: &str) -> Option<&str> {
    let start = line.find(USB_SCHEME)?;
    line[start..].split_whitespace().next()
}

/// Parse one `lpstat -v` line into `(queue name, uri)`.
///
/// `device for ZTC-ZT410-ABC123: usb://Zebra%20Technologies/...`
#[must_use]
pub fn installed_queue(line: &str) -> Option<(String, String)> {
    if !INSTALLED_MARKERS.iter().any(|m| line.contains(m)) {
        return None;
    }

    let uri = usb_uri(line)?;
    let head = line.split(':').next().unwrap_or_default();
    let name = head.strip_prefix(DEVICE_FOR).unwrap_or(head).trim();

    Some((name.to_string(), uri.to_string()))
}

/// Queue name from an `lpstat -v` line: last token before the first colon.
#[must_use]
pub fn queue_name(line: &str) -> Option<&str> {
    line.split(':').next()?.split_whitespace().last()
}

/// Serial number: everything after the last `=` of the URI.
#[must_use]
pub fn serial_from_uri(uri: &str) -> &str {
    uri.rsplit('=').next().unwrap_or(uri)
}

/// Parse one `lpinfo --include-schemes usb -v` line into `(serial, uri)`.
///
/// `direct usb://Zebra%20Technologies/ZTC%20ZT410?serial=ABC123`
#[must_use]
pub fn connected_device(line: &str) -> Option<(String, String)> {
    if !line.contains(CONNECTED_MARKER) {
        return None;
    }

    let uri = usb_uri(line)?;
    Some((serial_from_uri(uri).to_string(), uri.to_string()))
}

/// Serial from the `serial=` query parameter.
#[must_use]
pub fn serial_param(uri: &str) -> Option<&str> {
    let (_, rest) = uri.split_once("serial=")?;
    let serial = rest.split('&').next().unwrap_or(rest).trim();
    (!serial.is_empty()).then_some(serial)
}

/// Model component for a queue name: the URI path after the vendor host,
/// with `%20` and `/` turned into `-`.
///
/// `usb://Zebra%20Technologies/ZTC%20ZT410?serial=1` gives `ZTC-ZT410`.
#[must_use]
pub fn model_from_uri(uri: &str) -> String {
    let rest = uri.strip_prefix(USB_SCHEME).unwrap_or(uri);
    let location = rest.split('?').next().unwrap_or(rest);
    let path = location.split_once('/').map_or(location, |(_, path)| path);

    path.replace("%20", "-").replace('/', "-")
}

/// Product name from a `udevadm info -a` dump.
///
/// Picks the first `ATTRS{product}=="ZTC ..."` line and keeps only the value.
#[must_use]
pub fn product_name(dump: &str) -> Option<String> {
    dump.lines()
        .find(|line| {
            line.find("product")
                .is_some_and(|at| line[at..].contains("ZTC"))
        })
        .and_then(|line| line.rsplit('=').next())
        .map(|value| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

/// VID:PID of the first Zebra device in `lsusb` output.
///
/// `Bus 001 Device 005: ID 0a5f:0120 Zebra Technologies ZTC ZT410`
#[must_use]
pub fn zebra_usb_id(lsusb: &str) -> Option<UsbId> {
    lsusb
        .lines()
        .filter(|line| line.contains(CONNECTED_MARKER))
        .flat_map(str::split_whitespace)
        .find_map(|token| {
            let (vendor, product) = token.split_once(':')?;
            UsbId::from_hex(vendor, product)
        })
}

/// Split on runs of two or more spaces; trailing empty fields are dropped.
fn columns(line: &str) -> Vec<&str> {
    let bytes = line.as_bytes();
    let mut fields = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b' ' && bytes.get(i + 1) == Some(&b' ') {
            fields.push(&line[start..i]);
            while i < bytes.len() && bytes[i] == b' ' {
                i += 1;
            }
            start = i;
        } else {
            i += 1;
        }
    }
    fields.push(&line[start..]);

    while fields.last().is_some_and(|f| f.is_empty()) {
        fields.pop();
    }

    fields
}

/// Parse the `^HH` configuration dump.
///
/// Two columns are `(value, label)`; with three the first is dropped. Any
/// other shape is not a setting.
#[must_use]
pub fn config_table(text: &str) -> PrinterSettings {
    let mut settings = PrinterSettings::new();

    for line in text.lines() {
        let fields = columns(line);
        let (value, label) = match fields.as_slice() {
            [value, label] | [_, value, label] => (*value, label.trim()),
            _ => continue,
        };

        if label.is_empty() {
            continue;
        }

        settings.insert(label.to_string(), SettingValue::parse(value));
    }

    settings
}
