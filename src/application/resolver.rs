//! Serial number to device node and CUPS queue.

use std::path::PathBuf;

use super::context::Context;
use super::parser;
use crate::domain::{Result, ZebraError};
use crate::infrastructure::{CommandOutput, CommandSpec};

/// A device node whose udev attributes mention the serial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMatch {
    pub path: PathBuf,
    /// Full `udevadm info -a` dump for the node.
    pub attributes: String,
}

fn attribute_dump(ctx: &Context<'_>, node: &std::path::Path) -> CommandSpec {
    let node = node.to_string_lossy();
    ctx.listing("udevadm", &["info", "-a", node.as_ref()])
}

fn mentions(output: Option<CommandOutput>, serial: &str) -> Option<String> {
    output
        .filter(|out| out.success() && out.stdout.contains(serial))
        .map(|out| out.stdout)
}

/// First `lp*` node (by name) whose attribute dump contains `serial`.
///
/// With `probe.concurrent` all nodes are probed at once; the first match in
/// name order still wins.
pub fn find_device_node(ctx: &Context<'_>, serial: &str) -> Option<NodeMatch> {
    if serial.is_empty() {
        return None;
    }

    let nodes = ctx.device_nodes()?;

    if ctx.config.probe.concurrent {
        let specs: Vec<CommandSpec> = nodes.iter().map(|n| attribute_dump(ctx, n)).collect();
        let results = ctx.runner.run_all(&specs);

        return nodes
            .into_iter()
            .zip(results)
            .find_map(|(path, result)| {
                let output = result
                    .map_err(|e| tracing::warn!(node = %path.display(), error = %e, "Probe failed"))
                    .ok();
                mentions(output, serial).map(|attributes| NodeMatch { path, attributes })
            });
    }

    nodes.into_iter().find_map(|path| {
        let output = ctx.capture(&attribute_dump(ctx, &path));
        mentions(output, serial).map(|attributes| NodeMatch { path, attributes })
    })
}

/// Device node for `serial`, or `None` when it does not enumerate.
pub fn resolve_device_path(ctx: &Context<'_>, serial: &str) -> Option<PathBuf> {
    let found = find_device_node(ctx, serial).map(|m| m.path);

    if found.is_none() {
        tracing::warn!(serial, "Was unable to figure out the /dev/usb/lpX node");
    }

    found
}

/// CUPS queue name for `serial` from `lpstat -v`.
///
/// # Errors
/// Returns `ZebraError::Internal` if a line mentions the serial but carries
/// no queue name.
pub fn resolve_queue_name(ctx: &Context<'_>, serial: &str) -> Result<Option<String>> {
    if serial.is_empty() {
        return Ok(None);
    }

    let listing = ctx.lpstat();
    let Some(line) = listing.lines().find(|line| line.contains(serial)) else {
        tracing::error!(
            serial,
            "Is this a valid Zebra serial number? Cannot find this printer via lpstat -v"
        );
        return Ok(None);
    };

    parser::queue_name(line)
        .map(|name| Some(name.to_string()))
        .ok_or_else(|| {
            ZebraError::internal(format!("lpstat line for {serial} has no queue name: {line:?}"))
        })
}
