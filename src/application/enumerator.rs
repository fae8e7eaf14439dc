//! Installed CUPS queues and connected Zebra printers.

use std::collections::BTreeMap;

use super::context::Context;
use super::parser;
use super::resolver::find_device_node;
use crate::domain::ConnectedPrinter;

/// Zebra queues registered with CUPS, keyed by queue name.
pub fn list_installed(ctx: &Context<'_>) -> BTreeMap<String, String> {
    ctx.lpstat()
        .lines()
        .filter_map(parser::installed_queue)
        .collect()
}

/// Zebra printers on the USB bus, keyed by serial number.
pub fn list_connected(ctx: &Context<'_>) -> BTreeMap<String, ConnectedPrinter> {
    let mut connected = BTreeMap::new();

    for (serial, uri) in ctx.lpinfo_usb().lines().filter_map(parser::connected_device) {
        let mut printer = ConnectedPrinter {
            serial: serial.clone(),
            uri,
            ..ConnectedPrinter::default()
        };

        if let Some(node) = find_device_node(ctx, &serial) {
            printer.device_path = Some(node.path);
            printer.model = parser::product_name(&node.attributes).unwrap_or_default();
        } else {
            tracing::debug!(serial = %serial, "No device node for connected printer");
        }
        printer.installed = ctx.store.role_of(&serial);

        connected.insert(serial, printer);
    }

    tracing::info!(count = connected.len(), "Enumerated connected Zebra printers");

    connected
}
