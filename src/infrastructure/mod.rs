//! Infrastructure layer - external adapters (processes, USB, files, terminal).
//!
//! This layer handles all I/O operations and external dependencies.

pub mod command;
pub mod config;
pub mod prompt;
pub mod store;
pub mod usb;

#[cfg(test)]
pub mod testing;

pub use command::{CommandOutput, CommandRunner, CommandSpec, SystemRunner};
pub use config::{ensure_config_exists, load_config};
pub use prompt::{Prompt, TerminalPrompt};
pub use store::{open_store, BindingStore};
pub use usb::{LibUsb, ResetOutcome, UsbControl};
