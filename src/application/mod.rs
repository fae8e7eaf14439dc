//! Application layer - enumeration, resolution, sessions and installation.
//!
//! Stateless free functions over a borrowed [`Context`]; only
//! [`PrinterSession`] carries identity.

pub mod context;
pub mod enumerator;
pub mod formatter;
pub mod installer;
pub mod parser;
pub mod resolver;
pub mod session;

pub use context::Context;
pub use enumerator::{list_connected, list_installed};
pub use formatter::{
    format_connected_table, format_installed_table, format_json, format_settings_table,
    OutputFormat,
};
pub use installer::{install_printer, InstallOutcome};
pub use resolver::resolve_queue_name;
pub use session::{PrinterSession, SessionState};
