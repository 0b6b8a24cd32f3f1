//! Top-level flow: privilege check, context detection, then one of the two stages.

use std::{fs, path::Path, thread, time::Duration};

use tracing::{info, warn};

use crate::{
    catalog::Catalog,
    cli::Settings,
    cmd::{ExecMode, Gateway, Rooting, Runner, SystemRunner},
    config::{FirmwareMode, InstallConfig},
    error::InstallerError,
    layout::MountPlan,
    prompt::Prompter,
    steps::{
        collect::{self, CatalogSource, SystemCatalogs},
        disk, install, mount,
        network::{self, PingProbe, Probe},
    },
    ui,
};

/// Where the installer is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// The live medium; the new system still has to be built.
    PreInstall,
    /// Inside the new system, finishing from saved settings.
    ChangeRooted,
}

impl Environment {
    pub fn detect(marker: &Path) -> Self {
        if marker.exists() {
            Environment::PreInstall
        } else {
            Environment::ChangeRooted
        }
    }
}

/// Entry point for `main`.
pub fn run(settings: &Settings, prompter: &mut dyn Prompter) -> Result<(), InstallerError> {
    info!(target: "stage", "Starting");
    require_root()?;

    let environment = Environment::detect(&settings.marker);
    info!(target: "stage", "Detected environment: {:?}", environment);

    let mode = choose_mode(settings.debug, prompter)?;
    info!(target: "stage", "Execution mode: {:?}", mode);

    let catalogs = SystemCatalogs {
        zoneinfo: settings.zoneinfo.clone(),
        locale_dir: settings.locale_dir.clone(),
    };

    match environment {
        Environment::PreInstall => {
            let firmware = FirmwareMode::detect(&settings.efi_path);
            let mut gateway = Gateway::new(
                mode,
                Rooting::Outside {
                    target: settings.target.clone(),
                },
                SystemRunner,
            );
            iso_stage(
                settings,
                &mut gateway,
                prompter,
                &mut PingProbe,
                &catalogs,
                firmware,
            )
        }
        Environment::ChangeRooted => {
            let mut gateway = Gateway::new(mode, Rooting::Inside, SystemRunner);
            chroot_stage(settings, &mut gateway, &catalogs)
        }
    }
}

// ── Preconditions ─────────────────────────────────────────────────────────────

/// Fails unless the effective UID is 0.
pub fn require_root() -> Result<(), InstallerError> {
    let uid = fs::read_to_string("/proc/self/status")
        .ok()
        .and_then(|s| effective_uid(&s));

    match uid {
        Some(0) => Ok(()),
        _ => {
            warn!(target: "stage", "Not running as root (uid {:?})", uid);
            Err(InstallerError::NotRoot)
        }
    }
}

/// Effective UID from the `Uid:` line of `/proc/<pid>/status`.
pub fn effective_uid(status: &str) -> Option<u32> {
    status
        .lines()
        .find(|l| l.starts_with("Uid:"))
        .and_then(|l| l.split_whitespace().nth(2))
        .and_then(|v| v.parse().ok())
}

/// Execute unless `--debug` was given and the operator picks a dry run.
pub fn choose_mode(debug: bool, prompter: &mut dyn Prompter) -> Result<ExecMode, InstallerError> {
    if !debug {
        return Ok(ExecMode::Execute);
    }

    let options = [
        "Execute".to_string(),
        "Dry run (describe commands, change nothing)".to_string(),
    ];
    match prompter.select("Debug mode: how should commands be handled?", &options)? {
        0 => Ok(ExecMode::Execute),
        _ => Ok(ExecMode::DryRun),
    }
}

// ── Stages ────────────────────────────────────────────────────────────────────

/// Live-medium stage: network, disks, settings, then the full pipeline.
pub fn iso_stage<R: Runner>(
    settings: &Settings,
    gateway: &mut Gateway<R>,
    prompter: &mut dyn Prompter,
    probe: &mut dyn Probe,
    catalogs: &dyn CatalogSource,
    firmware: FirmwareMode,
) -> Result<(), InstallerError> {
    ui::print_banner();
    info!(target: "stage", "Entering ISO stage ({} firmware)", firmware);
    if gateway.is_dry_run() {
        ui::print_warning("DRY-RUN MODE: commands are described, nothing is changed.");
    }
    ui::print_info(&format!("Boot mode: {}", firmware));

    ui::print_step(1, 4, "Network");
    network::wait_for_network(probe, gateway, prompter)?;

    ui::print_step(2, 4, "Disks");
    let mapping = disk::run(gateway, prompter)?;

    ui::print_step(3, 4, "System Configuration");
    let mut config = InstallConfig::new(firmware);
    config.disks = Some(mapping);
    collect::run(&mut config, prompter, catalogs)?;

    if !collect::confirm_summary(&config, prompter)? {
        return Err(InstallerError::Cancelled);
    }

    // Nothing is mounted yet if planning fails.
    let phases = install::iso_plan(&config, &settings.target, &settings.resume_config)?;

    ui::print_step(4, 4, "Mounting");
    let mapping = config
        .disks
        .as_ref()
        .ok_or(InstallerError::Incomplete("disks"))?;
    mapping
        .validate()
        .map_err(|e| InstallerError::invalid("disk layout", e.to_string()))?;
    mount::run(gateway, &MountPlan::new(mapping, &settings.target), &settings.target)?;

    info!(target: "stage", "Running installation pipeline");
    install::run(gateway, &phases)?;

    info!(target: "stage", "ISO stage complete");
    println!();
    ui::print_success("Installation complete. Unmount the target and reboot when ready.");
    Ok(())
}

/// Resumed stage inside the new system, driven by the saved settings.
pub fn chroot_stage<R: Runner>(
    settings: &Settings,
    gateway: &mut Gateway<R>,
    catalogs: &dyn CatalogSource,
) -> Result<(), InstallerError> {
    info!(target: "stage", "Entering chroot stage");
    let config = InstallConfig::load(&settings.resume_config)?;
    let locales = fetch_catalog("locale", CATALOG_ATTEMPTS, CATALOG_RETRY_DELAY, || {
        catalogs.locales()
    })?;
    let keymaps = fetch_catalog("keymap", CATALOG_ATTEMPTS, CATALOG_RETRY_DELAY, || {
        catalogs.keymaps()
    })?;
    config.check_catalogs(&catalogs.timezones(), &locales, &keymaps)?;

    let phases = install::chroot_plan(&config, &settings.resume_config)?;
    install::run(gateway, &phases)?;

    info!(target: "stage", "Chroot stage complete");
    ui::print_success("System configuration finished.");
    Ok(())
}

/// Catalog loads attempted in the chroot stage before giving up.
pub const CATALOG_ATTEMPTS: usize = 3;
const CATALOG_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Loads a catalog without asking anyone, retrying a failed or empty load.
/// After the last attempt its result is returned as-is.
fn fetch_catalog<F>(
    name: &str,
    attempts: usize,
    delay: Duration,
    mut load: F,
) -> Result<Catalog, InstallerError>
where
    F: FnMut() -> Result<Catalog, InstallerError>,
{
    let mut attempt = 1;
    loop {
        let result = load();
        match &result {
            Ok(catalog) if !catalog.is_empty() => return result,
            Ok(_) => warn!(
                target: "stage",
                "The {} catalog is empty (attempt {}/{})", name, attempt, attempts
            ),
            Err(e) => warn!(
                target: "stage",
                "Could not load the {} catalog (attempt {}/{}): {}", name, attempt, attempts, e
            ),
        }
        if attempt >= attempts {
            return result;
        }
        attempt += 1;
        thread::sleep(delay);
    }
}
