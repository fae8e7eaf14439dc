//! Command/response session with one printer.
//!
//! A session resolves the queue name and device node once, at construction.
//! Connectivity is never cached: every check re-runs `lpinfo`, since the
//! printer can be unplugged at any time.

use std::path::Path;

use super::context::Context;
use super::enumerator::list_connected;
use super::parser;
use super::resolver::{resolve_device_path, resolve_queue_name};
use crate::domain::{
    Binding, DeviceReply, PrinterIdentity, PrinterSettings, ReadStatus, Result, Role, UsbId,
    ZebraError,
};
use crate::infrastructure::{CommandSpec, Prompt};

/// Clears the printer's input buffer before a query.
const RESET_SEQUENCE: &str = "^XA^XZ";

/// Asks the printer to dump its configuration (`^HH`).
pub const CONFIG_QUERY: &str = "^XA^HH^XZ";

const TEST_LABEL: &str = "\
^XA
^LT-6^LH100,100
^FO250,350
^A0N,70,30
^FDzebra-usb test label^FS
^XZ
";

/// Whether the session found a device node at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Device node known; device I/O is possible.
    Resolved,
    /// No device node; device I/O fails fast.
    Unreachable,
}

/// One printer, addressed by serial number.
pub struct PrinterSession<'a> {
    ctx: Context<'a>,
    identity: PrinterIdentity,
}

impl<'a> PrinterSession<'a> {
    /// Resolve queue name and device node for `serial`.
    ///
    /// # Errors
    /// Returns error if the serial is empty or `lpstat` output is malformed.
    pub fn open(ctx: Context<'a>, serial: &str, usb_id: Option<UsbId>) -> Result<Self> {
        if serial.is_empty() {
            return Err(ZebraError::not_found("printer serial number"));
        }

        tracing::info!(serial, "Trying to reach Zebra");

        let queue_name = resolve_queue_name(&ctx, serial)?.unwrap_or_default();
        let device_path = resolve_device_path(&ctx, serial);

        if let Some(path) = &device_path {
            tracing::info!(serial, node = %path.display(), "OK");
        }

        Ok(Self {
            ctx,
            identity: PrinterIdentity {
                serial: serial.to_string(),
                usb_id,
                queue_name,
                device_path,
            },
        })
    }

    /// Open a session for a stored binding.
    ///
    /// # Errors
    /// See [`PrinterSession::open`].
    pub fn from_binding(ctx: Context<'a>, binding: &Binding) -> Result<Self> {
        Self::open(ctx, &binding.serial, binding.usb_id)
    }

    /// Open a session for the printer bound to `role`.
    ///
    /// # Errors
    /// Returns `ZebraError::NotFound` if nothing is bound to the role.
    pub fn from_role(ctx: Context<'a>, role: Role) -> Result<Self> {
        let binding = ctx.store.get(role)?.ok_or_else(|| {
            tracing::error!(key = role.env_key(), "No printer binding is set; install first");
            ZebraError::not_found(format!("{role} printer binding ({})", role.env_key()))
        })?;

        Self::from_binding(ctx, &binding)
    }

    /// Like [`PrinterSession::from_role`] but `None` when the printer is not
    /// currently connected.
    ///
    /// # Errors
    /// See [`PrinterSession::from_role`].
    pub fn connect(ctx: Context<'a>, role: Role) -> Result<Option<Self>> {
        let session = Self::from_role(ctx, role)?;
        Ok(session.is_connected().then_some(session))
    }

    /// Pick a connected printer: the only one, or the operator's choice when
    /// several are attached. `None` when none is connected.
    ///
    /// # Errors
    /// Returns error if the prompt fails or `lpstat` output is malformed.
    pub fn choose(ctx: Context<'a>, prompt: &dyn Prompt) -> Result<Option<Self>> {
        let connected = list_connected(&ctx);
        let printers: Vec<_> = connected.values().collect();

        let printer = match printers.as_slice() {
            [] => {
                tracing::warn!("No Zebra printers connected");
                return Ok(None);
            }
            [only] => *only,
            many => {
                tracing::warn!("There are multiple printers connected to this device");
                let mut message = String::new();
                for (i, p) in many.iter().enumerate() {
                    message.push_str(&format!("[{}] {}, {}\n", i + 1, p.model, p.serial));
                }
                message.push_str("Which one would you like to work with?");

                let options: Vec<String> = (1..=many.len()).map(|i| i.to_string()).collect();
                let options: Vec<&str> = options.iter().map(String::as_str).collect();
                let answer = prompt.choose(&message, &options)?;

                let index = answer
                    .parse::<usize>()
                    .map_err(|_| ZebraError::internal(format!("invalid choice {answer:?}")))?;
                many[index - 1]
            }
        };

        let usb_id = printer
            .installed
            .and_then(|role| ctx.store.get(role).ok().flatten())
            .and_then(|binding| binding.usb_id);

        let session = Self::open(ctx, &printer.serial, usb_id)?;
        Ok(session.is_connected().then_some(session))
    }

    #[must_use]
    pub const fn identity(&self) -> &PrinterIdentity {
        &self.identity
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        if self.identity.device_path.is_some() {
            SessionState::Resolved
        } else {
            SessionState::Unreachable
        }
    }

    /// Reset the USB device if its ids are known. The outcome is only logged.
    fn reset_usb(&self) {
        if let Some(id) = self.identity.usb_id {
            let outcome = self.ctx.usb.reset(id);
            if outcome.is_reset() {
                tracing::debug!(device = %id, "USB device reset");
            } else {
                tracing::warn!(device = %id, ?outcome, "USB reset did not happen");
            }
        }
    }

    /// Whether `lpinfo` currently lists this printer. Resets the USB device
    /// when it does.
    pub fn is_connected(&self) -> bool {
        if !self.ctx.lpinfo_usb().contains(&self.identity.serial) {
            return false;
        }

        self.reset_usb();
        true
    }

    /// Write `payload` to the device node in its own process.
    fn write_device(&self, node: &Path, payload: &str) -> Result<()> {
        let spec = CommandSpec::new("sh")
            .args(["-c", "cat > \"$0\""])
            .arg(node.to_string_lossy())
            .stdin(format!("{payload}\n"))
            .timeout(self.ctx.config.timing.read_guard());

        let output = self.ctx.runner.run(&spec)?;
        if !output.success() {
            return Err(ZebraError::Command {
                command: format!("write to {}", node.display()),
                message: output.stderr.trim().to_string(),
                source: None,
            });
        }

        Ok(())
    }

    /// Send `zpl` and collect whatever the printer answers within the read
    /// window.
    ///
    /// Writes and the read-back run as separate processes; reading on the
    /// same pipe as the writer makes the printer report I/O errors.
    ///
    /// # Errors
    /// Returns `ZebraError::NotEnumerated` without a device node, or a
    /// command error if a write fails.
    pub fn send_and_read(&self, zpl: &str) -> Result<DeviceReply> {
        let Some(node) = &self.identity.device_path else {
            tracing::error!(
                serial = %self.identity.serial,
                "The printer does not enumerate on /dev/usb/lpX on this system"
            );
            return Err(ZebraError::NotEnumerated {
                serial: self.identity.serial.clone(),
            });
        };

        let timing = &self.ctx.config.timing;

        self.write_device(node, RESET_SEQUENCE)?;
        std::thread::sleep(timing.reset_settle());
        self.write_device(node, zpl)?;

        let read = CommandSpec::new("timeout")
            .arg(format!("{}s", timing.read_timeout_secs))
            .arg("cat")
            .arg(node.to_string_lossy())
            .timeout(timing.read_guard());
        let output = self.ctx.runner.run(&read)?;

        Ok(DeviceReply {
            raw_status: output.status,
            status: ReadStatus::from_exit(output.status),
            response: output.stdout,
            error: output.stderr,
        })
    }

    /// Printer configuration from `^HH`.
    ///
    /// The printer never closes the stream, so only a read that ran into the
    /// timeout counts as an answer; anything else gives `None`.
    pub fn get_config(&self) -> Option<PrinterSettings> {
        let reply = match self.send_and_read(CONFIG_QUERY) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "Configuration query failed");
                return None;
            }
        };

        if reply.status != ReadStatus::TimedOut {
            tracing::warn!(
                status = reply.raw_status,
                "Printer did not answer the configuration query"
            );
            return None;
        }

        Some(parser::config_table(&reply.response))
    }

    /// Queue `zpl` on this printer's CUPS queue.
    ///
    /// Cancels every outstanding job on every queue first. Returns `false` if
    /// the printer is disconnected, not installed, or `lp` rejects the job.
    pub fn print(&self, zpl: &str) -> bool {
        let serial = &self.identity.serial;

        if !self.ctx.lpinfo_usb().contains(serial.as_str()) {
            tracing::error!(serial = %serial, "Printer is not connected. Skipping print.");
            return false;
        }

        if self.identity.queue_name.is_empty() {
            tracing::error!(serial = %serial, "Printer has no CUPS queue. Skipping print.");
            return false;
        }

        let timing = &self.ctx.config.timing;

        let cancel = self.ctx.listing("cancel", &["-a", "-x"]);
        if let Some(output) = self.ctx.capture(&cancel) {
            if !output.success() {
                tracing::warn!(stderr = %output.stderr.trim(), "Could not cancel pending jobs");
            }
        }

        self.reset_usb();
        std::thread::sleep(timing.print_settle());

        tracing::info!(
            serial = %serial,
            queue = %self.identity.queue_name,
            "Queueing a print job"
        );

        let submit = self
            .ctx
            .listing("lp", &["-d", self.identity.queue_name.as_str(), "-"])
            .stdin(zpl);

        match self.ctx.capture(&submit) {
            Some(output) if output.success() => {
                tracing::info!(job = %output.stdout.trim(), "Print job queued");
                true
            }
            Some(output) => {
                tracing::error!(
                    status = output.status,
                    stderr = %output.stderr.trim(),
                    "Spooler rejected the print job"
                );
                false
            }
            None => false,
        }
    }

    /// Print a canned label.
    pub fn test_print(&self) -> bool {
        self.print(TEST_LABEL)
    }
}
