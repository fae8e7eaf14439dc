//! zebra-usb - management layer for USB-attached Zebra label printers.
//!
//! Finds printers on the USB bus, maps their serial numbers to CUPS queues
//! and `/dev/usb/lp*` nodes, installs new printers, and talks to them in
//! raw ZPL.
//!
//! QUICK START:
//!   zebra-usb --install                   # Bind the attached printer to a role
//!   zebra-usb --list                      # Connected printers and their roles
//!   zebra-usb --test                      # Test label on every bound printer
//!   zebra-usb --settings --role xxl       # Configuration dump of a printer
//!   zebra-usb --command '^XA^HH^XZ'       # Raw ZPL, print the reply

mod application;
mod cli;
mod domain;
mod infrastructure;

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{bail, Context as _};
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use application::{
    format_connected_table, format_installed_table, format_json, format_settings_table,
    install_printer, list_connected, list_installed, resolve_queue_name, Context, InstallOutcome,
    OutputFormat, PrinterSession, SessionState,
};
use cli::Cli;
use domain::Role;
use infrastructure::{
    ensure_config_exists, load_config, open_store, LibUsb, Prompt, SystemRunner, TerminalPrompt,
};

fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Main application logic.
fn run(cli: &Cli) -> anyhow::Result<()> {
    let format = cli.output_format().map_err(anyhow::Error::msg)?;

    if cli.write_config {
        let path = ensure_config_exists(cli.config.as_deref())
            .context("Failed to write config file")?;
        println!("{} Config file at {}", "✓".green().bold(), path.display());
        return Ok(());
    }

    let config = load_config(cli.config.as_deref()).context("Failed to load config")?;
    let runner = SystemRunner::new().context("Failed to start command runtime")?;
    let usb = LibUsb;
    let store = open_store(&config).context("Failed to open binding store")?;
    let ctx = Context::new(&runner, &usb, store.as_ref(), &config);
    let prompt = TerminalPrompt;

    if cli.install {
        cmd_install(ctx, &prompt)
    } else if cli.test {
        cmd_test(ctx)
    } else if cli.name {
        cmd_name(ctx, format)
    } else if cli.list {
        cmd_list(ctx, format)
    } else if cli.print {
        let session = open_session(ctx, cli, &prompt)?;
        let zpl = prompt.block("Paste ZPL, finish with an empty line")?;
        if !session.print(&zpl) {
            bail!("Print job for {} was not accepted", session.identity().serial);
        }
        println!("{} Sent to {}", "✓".green().bold(), session.identity().queue_name);
        Ok(())
    } else if let Some(zpl) = &cli.command {
        let session = open_session(ctx, cli, &prompt)?;
        require_device_node(&session)?;
        let reply = session
            .send_and_read(zpl)
            .with_context(|| format!("Command to {} failed", session.identity().serial))?;
        if !reply.error.trim().is_empty() {
            tracing::warn!(status = reply.raw_status, "{}", reply.error.trim());
        }
        println!("{}", reply.response);
        Ok(())
    } else if cli.settings {
        let session = open_session(ctx, cli, &prompt)?;
        require_device_node(&session)?;
        let Some(settings) = session.get_config() else {
            bail!("No configuration dump from {}", session.identity().serial);
        };
        let output = match format {
            OutputFormat::Table => format_settings_table(&settings),
            OutputFormat::Json => format_json(&settings)?,
        };
        println!("{output}");
        Ok(())
    } else {
        bail!("No action given")
    }
}

/// Session for `--pick` or the selected role; fails if the printer is absent.
fn open_session<'a>(
    ctx: Context<'a>,
    cli: &Cli,
    prompt: &dyn Prompt,
) -> anyhow::Result<PrinterSession<'a>> {
    let session = if cli.pick {
        PrinterSession::choose(ctx, prompt)?
    } else {
        PrinterSession::connect(ctx, cli.role)?
    };

    session.context("Printer is not connected")
}

/// Device I/O needs a `/dev/usb/lp*` node.
fn require_device_node(session: &PrinterSession<'_>) -> anyhow::Result<()> {
    if session.state() == SessionState::Unreachable {
        bail!(
            "{} does not enumerate under /dev/usb on this system",
            session.identity().serial
        );
    }
    Ok(())
}

/// Install command.
fn cmd_install(ctx: Context<'_>, prompt: &dyn Prompt) -> anyhow::Result<()> {
    match install_printer(ctx, prompt).context("Installation failed")? {
        InstallOutcome::Installed {
            identity,
            role,
            test_printed,
        } => {
            println!(
                "{} {} installed as {} printer (queue {}, {}=\"{}\")",
                "✓".green().bold(),
                identity.serial.cyan(),
                role,
                identity.queue_name,
                role.env_key(),
                identity.binding()
            );
            if !test_printed {
                tracing::warn!("Test label was not accepted by the spooler");
            }
            prompt.acknowledge("Restart the terminal for changes to take effect")?;
            Ok(())
        }
        InstallOutcome::NoneConnected => bail!("No Zebra printer connected"),
        InstallOutcome::Ambiguous { count } => Err(domain::ZebraError::Ambiguous { count })
            .context("Attach only the printer to install"),
        InstallOutcome::MissingSerial => bail!("Printer URI carries no serial number"),
    }
}

/// Test label on every bound printer.
fn cmd_test(ctx: Context<'_>) -> anyhow::Result<()> {
    let mut first = true;
    for role in Role::ALL {
        let Some(binding) = ctx.store.get(role)? else {
            tracing::warn!(key = role.env_key(), "No {role} printer bound");
            continue;
        };

        if !first {
            std::thread::sleep(Duration::from_secs(1));
        }
        first = false;

        let session = PrinterSession::from_binding(ctx, &binding)?;
        if session.test_print() {
            println!("{} Test label sent to {role} printer", "✓".green().bold());
        } else {
            println!("{} {role} printer did not take the test label", "✗".red().bold());
        }
    }
    Ok(())
}

/// Queue name of every bound printer.
fn cmd_name(ctx: Context<'_>, format: OutputFormat) -> anyhow::Result<()> {
    let mut names = BTreeMap::new();
    for role in Role::ALL {
        let queue = match ctx.store.get(role)? {
            Some(binding) => resolve_queue_name(&ctx, &binding.serial)?,
            None => None,
        };
        names.insert(role.to_string(), queue);
    }

    match format {
        OutputFormat::Json => println!("{}", format_json(&names)?),
        OutputFormat::Table => {
            for role in Role::ALL {
                let queue = names
                    .get(&role.to_string())
                    .and_then(Option::as_deref)
                    .unwrap_or("-");
                match ctx.store.updated_at(role)? {
                    Some(at) => println!(
                        "{}: {} (bound {})",
                        role.to_string().bold(),
                        queue,
                        at.format("%Y-%m-%d %H:%M")
                    ),
                    None => println!("{}: {}", role.to_string().bold(), queue),
                }
            }
        }
    }
    Ok(())
}

/// Connected printers and installed queues.
fn cmd_list(ctx: Context<'_>, format: OutputFormat) -> anyhow::Result<()> {
    let connected = list_connected(&ctx);
    let installed = list_installed(&ctx);

    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "connected": connected,
                "installed": installed,
            });
            println!("{}", format_json(&value)?);
        }
        OutputFormat::Table => {
            println!("{}", format_connected_table(&connected));
            println!();
            println!("{}", format_installed_table(&installed));
        }
    }
    Ok(())
}

/// Setup tracing/logging based on verbosity level.
fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
