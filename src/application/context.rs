//! Collaborators shared by the enumerator, resolver, session and installer.

use std::path::PathBuf;

use crate::domain::AppConfig;
use crate::infrastructure::{BindingStore, CommandOutput, CommandRunner, CommandSpec, UsbControl};

/// Borrowed handles to everything that touches the host.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub runner: &'a dyn CommandRunner,
    pub usb: &'a dyn UsbControl,
    pub store: &'a dyn BindingStore,
    pub config: &'a AppConfig,
}

impl<'a> Context<'a> {
    #[must_use]
    pub const fn new(
        runner: &'a dyn CommandRunner,
        usb: &'a dyn UsbControl,
        store: &'a dyn BindingStore,
        config: &'a AppConfig,
    ) -> Self {
        Self {
            runner,
            usb,
            store,
            config,
        }
    }

    /// Listing command with the configured listing timeout.
    pub(crate) fn listing(&self, program: &str, args: &[&str]) -> CommandSpec {
        CommandSpec::new(program)
            .args(args.iter().copied())
            .timeout(self.config.timing.list_timeout())
    }

    /// Run a command and return its output; failures are logged.
    pub(crate) fn capture(&self, spec: &CommandSpec) -> Option<CommandOutput> {
        match self.runner.run(spec) {
            Ok(output) => Some(output),
            Err(e) => {
                tracing::warn!(command = %spec.command_line(), error = %e, "Command failed");
                None
            }
        }
    }

    /// Stdout of a listing command; spawn errors, timeouts and non-zero exits
    /// all count as empty output.
    pub(crate) fn list(&self, program: &str, args: &[&str]) -> String {
        let spec = self.listing(program, args);
        match self.capture(&spec) {
            Some(output) if output.success() => output.stdout,
            Some(output) => {
                tracing::warn!(
                    command = %spec.command_line(),
                    status = output.status,
                    stderr = %output.stderr.trim(),
                    "Command exited with failure"
                );
                String::new()
            }
            None => String::new(),
        }
    }

    /// Stdout of `lpinfo --include-schemes usb -v`.
    pub(crate) fn lpinfo_usb(&self) -> String {
        self.list("lpinfo", &["--include-schemes", "usb", "-v"])
    }

    /// Stdout of `lpstat -v`.
    pub(crate) fn lpstat(&self) -> String {
        self.list("lpstat", &["-v"])
    }

    /// `lp*` entries of the USB line-printer directory, sorted by name.
    /// `None` when the directory cannot be read.
    pub(crate) fn device_nodes(&self) -> Option<Vec<PathBuf>> {
        let dir = &self.config.paths.usb_device_dir;
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(
                    dir = %dir.display(),
                    error = %e,
                    "Unable to enumerate USB line-printer devices"
                );
                return None;
            }
        };

        let mut nodes: Vec<PathBuf> = entries
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().starts_with("lp"))
            .map(|entry| entry.path())
            .collect();
        nodes.sort();

        Some(nodes)
    }
}
