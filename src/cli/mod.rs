//! CLI interface using clap.
//!
//! One action flag per invocation; the role, output format and config file
//! apply to whichever action runs.

use std::path::PathBuf;

use clap::{ArgGroup, Parser};

use crate::application::OutputFormat;
use crate::domain::Role;

/// zebra-usb - install, probe and print to USB-attached Zebra label printers.
#[derive(Parser, Debug)]
#[command(name = "zebra-usb")]
#[command(author, version, about, long_about = None)]
#[command(group(
    ArgGroup::new("action")
        .required(true)
        .args(["install", "test", "name", "print", "command", "list", "settings", "write_config"]),
))]
pub struct Cli {
    /// Install the single connected Zebra printer and bind it to a role.
    #[arg(long)]
    pub install: bool,

    /// Print a test label on every bound printer.
    #[arg(long)]
    pub test: bool,

    /// Show the CUPS queue name of every bound printer.
    #[arg(long)]
    pub name: bool,

    /// Read ZPL from the terminal and send it through the print queue.
    #[arg(long)]
    pub print: bool,

    /// Send raw ZPL to the device node and show the reply.
    #[arg(long, value_name = "ZPL")]
    pub command: Option<String>,

    /// List connected Zebra printers.
    #[arg(long)]
    pub list: bool,

    /// Show the printer's configuration dump.
    #[arg(long)]
    pub settings: bool,

    /// Write the default config file if it does not exist yet.
    #[arg(long)]
    pub write_config: bool,

    /// Printer role used by --print, --command and --settings.
    #[arg(short, long, default_value = "primary")]
    pub role: Role,

    /// Choose among connected printers instead of using the role binding.
    #[arg(long)]
    pub pick: bool,

    /// Output format: table or json.
    #[arg(short, long, default_value = "table")]
    pub format: String,

    /// Config file (defaults to the user config directory).
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Parse the output format argument.
    pub fn output_format(&self) -> Result<OutputFormat, String> {
        self.format.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_requires_one_action() {
        assert!(Cli::try_parse_from(["zebra-usb"]).is_err());
        assert!(Cli::try_parse_from(["zebra-usb", "--list", "--test"]).is_err());
    }

    #[test]
    fn test_command_with_role() {
        let cli =
            Cli::try_parse_from(["zebra-usb", "--command", "^XA^HH^XZ", "--role", "xxl"]).unwrap();
        assert_eq!(cli.command.as_deref(), Some("^XA^HH^XZ"));
        assert_eq!(cli.role, Role::Supplementary);
        assert_eq!(cli.output_format().unwrap(), OutputFormat::Table);
    }
}
