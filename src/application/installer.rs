//! First-time setup of a Zebra printer.
//!
//! Registers the CUPS queue, grants device access through udev, asks the
//! operator for the role and stores the binding. Only one Zebra may be
//! attached while installing, so the serial that gets bound is never a guess.

use std::fs;

use super::context::Context;
use super::parser;
use super::session::PrinterSession;
use crate::domain::{Binding, PrinterIdentity, Result, Role, UsbId, ZebraError};
use crate::infrastructure::{CommandSpec, Prompt};

/// How an install attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Printer bound to `role`; `test_printed` tells whether the
    /// verification label was accepted by the spooler.
    Installed {
        identity: PrinterIdentity,
        role: Role,
        test_printed: bool,
    },
    /// No Zebra printer on the bus.
    NoneConnected,
    /// More than one Zebra printer on the bus.
    Ambiguous { count: usize },
    /// The device URI carries no `serial=` parameter.
    MissingSerial,
}

/// Install the single connected Zebra printer.
///
/// # Errors
/// Returns error if queue registration, the udev rule, the role prompt or
/// the binding store fails, or `lsusb` does not list the printer.
pub fn install_printer(ctx: Context<'_>, prompt: &dyn Prompt) -> Result<InstallOutcome> {
    tracing::info!("Discovering connected printers... This may take up to 15 sec...");

    let listing = ctx.lpinfo_usb();
    let candidates: Vec<&str> = listing
        .lines()
        .filter(|line| !line.trim().is_empty() && line.contains(parser::CONNECTED_MARKER))
        .collect();

    let line = match candidates.as_slice() {
        [] => {
            tracing::error!("No Zebra printers connected");
            return Ok(InstallOutcome::NoneConnected);
        }
        [line] => *line,
        many => {
            tracing::error!(
                count = many.len(),
                "Installation supports only one printer at a time. \
                 Please disconnect all printers except the one you want to install"
            );
            return Ok(InstallOutcome::Ambiguous { count: many.len() });
        }
    };

    let uri = parser::usb_uri(line)
        .ok_or_else(|| ZebraError::internal(format!("Zebra device line has no usb:// URI: {line:?}")))?;

    let Some(serial) = parser::serial_param(uri) else {
        tracing::error!(line, "Couldn't extract serial number");
        return Ok(InstallOutcome::MissingSerial);
    };

    let queue = format!("{}-{serial}", parser::model_from_uri(uri));

    if ctx.lpstat().contains(serial) {
        tracing::info!(serial, "Printer already has a CUPS queue");
    } else {
        register_queue(&ctx, &queue, uri)?;
    }

    let usb_id = parser::zebra_usb_id(&ctx.list("lsusb", &[]))
        .ok_or_else(|| ZebraError::not_found("Zebra vendor/product id in lsusb output"))?;

    ensure_udev_rule(&ctx, usb_id)?;

    let role = ask_role(prompt)?;
    let binding = Binding::new(serial, Some(usb_id));
    ctx.store.set(role, &binding)?;
    tracing::info!(key = role.env_key(), binding = %binding, "Printer bound");

    let session = PrinterSession::from_binding(ctx, &binding)?;
    let test_printed = session.test_print();

    Ok(InstallOutcome::Installed {
        identity: session.identity().clone(),
        role,
        test_printed,
    })
}

/// `lpadmin` the queue, then restart CUPS and give it time to come back.
fn register_queue(ctx: &Context<'_>, queue: &str, uri: &str) -> Result<()> {
    tracing::info!(queue, uri, "Printer must be installed first");

    let spec = ctx.listing("lpadmin", &["-p", queue, "-v", uri, "-E"]);
    let output = ctx.runner.run(&spec)?;
    if !output.success() {
        return Err(ZebraError::Command {
            command: spec.command_line(),
            message: output.stderr.trim().to_string(),
            source: None,
        });
    }

    tracing::info!("Restarting cups.service...");
    let restart = CommandSpec::new("systemctl").args(["restart", "cups"]);
    if let Some(output) = ctx.capture(&restart) {
        if !output.success() {
            tracing::warn!(stderr = %output.stderr.trim(), "Could not restart cups.service");
        }
    }
    std::thread::sleep(ctx.config.timing.spooler_restart());

    Ok(())
}

/// Write the vendor-wide udev rule once.
///
/// An existing rule file is never touched, even if it names another vendor.
fn ensure_udev_rule(ctx: &Context<'_>, usb_id: UsbId) -> Result<()> {
    let path = &ctx.config.paths.udev_rule_path;
    if path.exists() {
        tracing::debug!(path = %path.display(), "Udev rule already present");
        return Ok(());
    }

    let rule = format!(
        "SUBSYSTEM==\"usb\", ATTR{{idVendor}}==\"{}\", MODE=\"0666\"\n",
        usb_id.vendor_hex()
    );

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| ZebraError::io("Failed to create udev rules directory", e))?;
    }
    fs::write(path, rule)
        .map_err(|e| ZebraError::io(format!("Failed to write {}", path.display()), e))?;
    tracing::info!(path = %path.display(), "Udev rule written");

    let reload = CommandSpec::new("udevadm").args(["control", "--reload-rules"]);
    if let Some(output) = ctx.capture(&reload) {
        if !output.success() {
            tracing::warn!(stderr = %output.stderr.trim(), "Could not reload udev rules");
        }
    }

    if let Err(e) = ctx
        .runner
        .spawn_detached(&CommandSpec::new("udevadm").arg("trigger"))
    {
        tracing::warn!(error = %e, "Could not trigger udev");
    }

    Ok(())
}

fn ask_role(prompt: &dyn Prompt) -> Result<Role> {
    let answer = prompt.choose(
        "If this is a REGULAR Zebra label printer, enter [R].\n\
         If this is a SUPPLEMENTARY (Packout ONLY) label printer, enter [S].\n\
         Your input",
        &["R", "S"],
    )?;

    Ok(if answer == "S" {
        Role::Supplementary
    } else {
        Role::Primary
    })
}
