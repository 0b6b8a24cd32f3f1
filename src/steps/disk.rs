use console::style;
use strum::IntoEnumIterator;
use tracing::{error, info};

use crate::{
    blockdev::{self, BlockDevice, EnumerationError},
    cmd::{CommandSpec, Gateway, Runner},
    error::InstallerError,
    layout::{DiskMapping, DiskMappingBuilder, Role, CUSTOM_TERMINATOR},
    prompt::Prompter,
    ui,
};

/// Asks how the disk should be prepared and returns the resulting layout.
pub fn run<R: Runner>(
    gateway: &mut Gateway<R>,
    prompter: &mut dyn Prompter,
) -> Result<DiskMapping, InstallerError> {
    let modes = [
        "Automatic (EVERYTHING WILL BE CLEARED!)".to_string(),
        "Manual".to_string(),
    ];

    match prompter.select("Partitioning mode", &modes)? {
        0 => {
            info!(target: "disk", "Automatic mode selected");
            automatic(prompter, blockdev::list_disks)
        }
        _ => {
            info!(target: "disk", "Manual mode selected");
            manual(gateway, prompter)
        }
    }
}

// ── Automatic ─────────────────────────────────────────────────────────────────

fn automatic<F>(prompter: &mut dyn Prompter, enumerate: F) -> Result<DiskMapping, InstallerError>
where
    F: FnMut() -> Result<Vec<BlockDevice>, EnumerationError>,
{
    let disk = select_disk(prompter, enumerate)?;
    error!(target: "disk", "Automatic partitioning requested for {}", disk);
    Err(InstallerError::NotImplemented(format!(
        "Automatic partitioning of {}",
        disk
    )))
}

/// Lists disks and returns the path the operator picks from them.
///
/// A failed or empty listing is offered for retry instead of aborting.
pub fn select_disk<F>(prompter: &mut dyn Prompter, mut enumerate: F) -> Result<String, InstallerError>
where
    F: FnMut() -> Result<Vec<BlockDevice>, EnumerationError>,
{
    let disks = loop {
        match enumerate() {
            Ok(disks) => break disks,
            Err(e) => {
                error!(target: "disk", "{}", e);
                ui::print_error(&e.to_string());
                if !prompter.confirm("List disks again?", true)? {
                    return Err(InstallerError::Cancelled);
                }
            }
        }
    };

    println!();
    ui::print_warning("Do not install to the USB you are booted off or else this will break!");
    println!(
        "  {:<14}  {:>8}  {:<6}  {}",
        style("DISK").dim(),
        style("SIZE").dim(),
        style("TYPE").dim(),
        style("MODEL").dim()
    );
    println!("  {}", style("─".repeat(48)).dim());
    for disk in &disks {
        println!("  {}", disk.display());
    }
    println!();

    loop {
        let choice = prompter.input("Select disk from the list above (use path)")?;
        let choice = choice.trim();
        if let Some(disk) = disks.iter().find(|d| d.path == choice) {
            info!(target: "disk", "Selected disk: {}", disk.path);
            return Ok(disk.path.clone());
        }
        ui::print_error("Path incorrect. Please try again.");
    }
}

// ── Manual ────────────────────────────────────────────────────────────────────

fn manual<R: Runner>(
    gateway: &mut Gateway<R>,
    prompter: &mut dyn Prompter,
) -> Result<DiskMapping, InstallerError> {
    let options = [
        "My partitions are already set up".to_string(),
        "Open GParted to partition now".to_string(),
    ];

    if prompter.select("Manual partitioning", &options)? == 1 {
        gateway.launch_detached(&CommandSpec::host("Open GParted", ["gparted"]))?;
        ui::print_info("GParted opens in a new window. Partition your disk and come back here.");
        prompter.pause("Press Enter when you are done with GParted")?;
    }

    collect_mapping(prompter)
}

/// Asks for a device per required role, then for any custom mount points.
pub fn collect_mapping(prompter: &mut dyn Prompter) -> Result<DiskMapping, InstallerError> {
    let mut builder = DiskMappingBuilder::default();

    for role in Role::iter() {
        loop {
            let device = prompter.input(&format!(
                "Enter the device path for {} (e.g. /dev/sda1)",
                role
            ))?;
            match builder.assign(role, &device) {
                Ok(()) => {
                    ui::print_success(&format!("{} selected: {}", role, device.trim()));
                    break;
                }
                Err(e) => ui::print_error(&e.to_string()),
            }
        }
    }

    if prompter.confirm("Do you have any custom mount point partitions (e.g. /home)?", false)? {
        ui::print_info("Format: /dev/sdXY:/mountpoint (example: /dev/sda3:/home).");
        ui::print_info(&format!("Type '{}' to finish adding.", CUSTOM_TERMINATOR));
        loop {
            let entry = prompter.input("Custom partition")?;
            let entry = entry.trim();
            if entry.eq_ignore_ascii_case(CUSTOM_TERMINATOR) {
                break;
            }
            match builder.add_custom_pair(entry) {
                Ok(()) => ui::print_success(&format!("Added: {}", entry)),
                Err(e) => ui::print_error(&e.to_string()),
            }
        }
    }

    let mapping = builder
        .build()
        .map_err(|e| InstallerError::invalid("disk layout", e.to_string()))?;
    info!(
        target: "disk",
        "Disk layout: {}",
        mapping
            .entries()
            .map(|(d, m)| format!("{} -> {}", d, m))
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(mapping)
}
