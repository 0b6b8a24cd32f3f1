//! The privileged installation pipeline.
//!
//! The whole run is planned up front as a list of [`Phase`]s, then handed to
//! the gateway one action at a time. Planning fails before anything runs when
//! the configuration is incomplete or asks for an unsupported path.

use std::path::Path;

use tracing::info;

use crate::{
    cmd::{CommandSpec, FileWrite, Gateway, Runner},
    config::{FirmwareMode, InstallConfig, ReadyConfig},
    error::InstallerError,
    ui,
};

/// Swap backing file, relative to the installed system's root.
pub const SWAPFILE: &str = "swapfile";
pub const SWAP_SIZE_MIB: u32 = 16 * 1024;

pub const BASE_PACKAGES: &[&str] = &["base", "linux", "linux-firmware"];
pub const UTILITY_PACKAGES: &[&str] = &[
    "base-devel",
    "nano",
    "sudo",
    "gparted",
    "gnome-disk-utility",
    "git",
    "man-db",
];
pub const UEFI_PACKAGES: &[&str] = &["grub", "efibootmgr"];

pub const USER_GROUPS: &str = "video,storage,wheel";
pub const WHEEL_SUDOERS: &str = "/etc/sudoers.d/10-wheel";

/// Throwaway account that builds AUR packages; makepkg refuses to run as root.
pub const BUILD_USER: &str = "aurbuild";
pub const BUILD_SUDOERS: &str = "/etc/sudoers.d/99-aurbuild";
pub const AUR_HELPERS: &[&str] = &["paru", "yay"];

// ── Plan ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Run(CommandSpec),
    Write(FileWrite),
    /// Run `command` with captured stdout and write that output to `file`.
    AppendOutput { command: CommandSpec, file: FileWrite },
}

impl Action {
    pub fn descriptions(&self) -> Vec<&str> {
        match self {
            Action::Run(spec) => vec![spec.description.as_str()],
            Action::Write(file) => vec![file.description.as_str()],
            Action::AppendOutput { command, file } => {
                vec![command.description.as_str(), file.description.as_str()]
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase {
    pub title: &'static str,
    pub actions: Vec<Action>,
}

impl Phase {
    fn new(title: &'static str, actions: Vec<Action>) -> Self {
        Self { title, actions }
    }
}

/// The full run from the live environment into the mounted `target`.
///
/// `resume_doc` is where the configuration is saved inside the new system,
/// so an interrupted install can be finished from there.
pub fn iso_plan(
    config: &InstallConfig,
    target: &Path,
    resume_doc: &Path,
) -> Result<Vec<Phase>, InstallerError> {
    let ready = config.ready()?;
    let bootloader = bootloader(ready.firmware)?;
    let target_str = target.display().to_string();

    let mut phases = vec![
        swap(target),
        Phase::new(
            "Package Keyring",
            vec![Action::Run(CommandSpec::host(
                "Refresh package keyring and databases",
                ["pacman", "-Sy", "--noconfirm", "archlinux-keyring"],
            ))],
        ),
        base_system(config, &ready, &target_str),
        Phase::new(
            "Filesystem Table",
            vec![
                Action::AppendOutput {
                    command: CommandSpec::host(
                        "Generate filesystem table",
                        ["genfstab", "-U", target_str.as_str()],
                    )
                    .captured(),
                    file: FileWrite::chroot("Write /etc/fstab", "/etc/fstab", "").appending(),
                },
                Action::Write(
                    FileWrite::chroot(
                        format!("Save installation settings to {}", resume_doc.display()),
                        resume_doc,
                        config.to_json()?,
                    )
                    .private(),
                ),
            ],
        ),
    ];
    phases.extend(system_setup(&ready, bootloader, resume_doc));
    Ok(phases)
}

/// The change-rooted part alone, for resuming from a saved configuration.
pub fn chroot_plan(config: &InstallConfig, resume_doc: &Path) -> Result<Vec<Phase>, InstallerError> {
    let ready = config.ready()?;
    let bootloader = bootloader(ready.firmware)?;
    Ok(system_setup(&ready, bootloader, resume_doc))
}

fn system_setup(ready: &ReadyConfig<'_>, bootloader: Phase, resume_doc: &Path) -> Vec<Phase> {
    let doc = resume_doc.display().to_string();
    vec![
        localization(ready),
        users(ready),
        aur_helpers(),
        bootloader,
        Phase::new(
            "Cleanup",
            vec![Action::Run(CommandSpec::chroot(
                "Remove saved installation settings",
                ["rm", "-f", doc.as_str()],
            ))],
        ),
    ]
}

// ── Phases ────────────────────────────────────────────────────────────────────

fn swap(target: &Path) -> Phase {
    let file = target.join(SWAPFILE).display().to_string();
    Phase::new(
        "Swap",
        vec![
            Action::Run(CommandSpec::host(
                format!("Allocate {} MiB swap file", SWAP_SIZE_MIB),
                [
                    "dd".to_string(),
                    "if=/dev/zero".to_string(),
                    format!("of={}", file),
                    "bs=1M".to_string(),
                    format!("count={}", SWAP_SIZE_MIB),
                    "status=progress".to_string(),
                ],
            )),
            Action::Run(CommandSpec::host(
                "Restrict swap file permissions",
                ["chmod", "600", file.as_str()],
            )),
            Action::Run(CommandSpec::host("Format swap file", ["mkswap", file.as_str()])),
            Action::Run(CommandSpec::host("Enable swap file", ["swapon", file.as_str()])),
        ],
    )
}

fn base_system(config: &InstallConfig, ready: &ReadyConfig<'_>, target: &str) -> Phase {
    let mut argv: Vec<&str> = vec!["pacstrap", "-K", target];
    argv.extend(BASE_PACKAGES);
    argv.extend(UTILITY_PACKAGES);
    if ready.firmware == FirmwareMode::Uefi {
        argv.extend(UEFI_PACKAGES);
    }
    argv.extend(config.desktop_packages());
    argv.extend(config.browser_packages());

    Phase::new(
        "Base System",
        vec![Action::Run(CommandSpec::host("Install base system", argv))],
    )
}

/// The locale name with the UTF-8 codeset, keeping any `@modifier` last.
pub fn utf8_locale(locale: &str) -> String {
    match locale.split_once('@') {
        Some((name, modifier)) => format!("{}.UTF-8@{}", name, modifier),
        None => format!("{}.UTF-8", locale),
    }
}

fn localization(ready: &ReadyConfig<'_>) -> Phase {
    let locale = utf8_locale(ready.locale);
    Phase::new(
        "Localization",
        vec![
            Action::Run(CommandSpec::chroot(
                format!("Link timezone {}", ready.timezone),
                [
                    "ln".to_string(),
                    "-sf".to_string(),
                    format!("/usr/share/zoneinfo/{}", ready.timezone),
                    "/etc/localtime".to_string(),
                ],
            )),
            Action::Run(CommandSpec::chroot(
                "Sync hardware clock",
                ["hwclock", "--systohc"],
            )),
            Action::Write(
                FileWrite::chroot(
                    format!("Enable {} in /etc/locale.gen", locale),
                    "/etc/locale.gen",
                    format!("{} UTF-8\n", locale),
                )
                .appending(),
            ),
            Action::Run(CommandSpec::chroot("Generate locales", ["locale-gen"])),
            Action::Write(FileWrite::chroot(
                "Write /etc/locale.conf",
                "/etc/locale.conf",
                format!("LANG={}\n", locale),
            )),
            Action::Write(FileWrite::chroot(
                "Write /etc/vconsole.conf",
                "/etc/vconsole.conf",
                format!("KEYMAP={}\n", ready.keymap),
            )),
            Action::Write(FileWrite::chroot(
                "Write /etc/hostname",
                "/etc/hostname",
                format!("{}\n", ready.hostname),
            )),
        ],
    )
}

fn users(ready: &ReadyConfig<'_>) -> Phase {
    let name = ready.user.name.as_str();
    let mut actions = vec![Action::Run(CommandSpec::chroot(
        format!("Create user {}", name),
        ["useradd", "-m", "-G", USER_GROUPS, "-s", "/bin/bash", name],
    ))];

    if ready.user.password.is_empty() {
        actions.push(Action::Run(CommandSpec::chroot(
            format!("Clear password of {}", name),
            ["passwd", "-d", name],
        )));
    } else {
        actions.push(Action::Run(
            CommandSpec::chroot(format!("Set password of {}", name), ["chpasswd"])
                .with_stdin(format!("{}:{}\n", name, ready.user.password)),
        ));
    }

    actions.push(Action::Run(
        CommandSpec::chroot("Set root password", ["chpasswd"])
            .with_stdin(format!("root:{}\n", ready.root_password)),
    ));
    actions.push(Action::Write(
        FileWrite::chroot(
            "Allow wheel group to use sudo",
            WHEEL_SUDOERS,
            "%wheel ALL=(ALL:ALL) ALL\n",
        )
        .private(),
    ));

    Phase::new("Users", actions)
}

fn aur_helpers() -> Phase {
    let home = format!("/home/{}", BUILD_USER);
    let mut actions = vec![
        Action::Run(CommandSpec::chroot(
            "Create temporary build user",
            ["useradd", "-m", "-s", "/bin/bash", BUILD_USER],
        )),
        Action::Write(
            FileWrite::chroot(
                "Grant build user passwordless sudo",
                BUILD_SUDOERS,
                format!("{} ALL=(ALL) NOPASSWD: ALL\n", BUILD_USER),
            )
            .private(),
        ),
    ];

    for helper in AUR_HELPERS {
        let dir = format!("{}/{}", home, helper);
        actions.push(Action::Run(CommandSpec::chroot(
            format!("Download AUR helper {}", helper),
            [
                "sudo".to_string(),
                "-u".to_string(),
                BUILD_USER.to_string(),
                "git".to_string(),
                "clone".to_string(),
                format!("https://aur.archlinux.org/{}.git", helper),
                dir.clone(),
            ],
        )));
        actions.push(Action::Run(CommandSpec::chroot(
            format!("Build AUR helper {}", helper),
            [
                "bash".to_string(),
                "-c".to_string(),
                format!(
                    "cd {} && sudo -u {} makepkg -si --noconfirm",
                    dir, BUILD_USER
                ),
            ],
        )));
    }

    actions.push(Action::Run(CommandSpec::chroot(
        "Revoke build user sudo",
        ["rm", "-f", BUILD_SUDOERS],
    )));
    actions.push(Action::Run(CommandSpec::chroot(
        "Remove temporary build user",
        ["userdel", "-r", BUILD_USER],
    )));

    Phase::new("AUR Helpers", actions)
}

fn bootloader(firmware: FirmwareMode) -> Result<Phase, InstallerError> {
    match firmware {
        FirmwareMode::Uefi => Ok(Phase::new(
            "Bootloader",
            vec![
                Action::Run(CommandSpec::chroot(
                    "Install GRUB (UEFI)",
                    [
                        "grub-install",
                        "--target=x86_64-efi",
                        "--efi-directory=/boot/efi",
                        "--bootloader-id=arch",
                        "--removable",
                    ],
                )),
                Action::Run(CommandSpec::chroot(
                    "Generate GRUB configuration",
                    ["grub-mkconfig", "-o", "/boot/grub/grub.cfg"],
                )),
            ],
        )),
        FirmwareMode::Bios => Err(InstallerError::NotImplemented(
            "BIOS bootloader installation".to_string(),
        )),
    }
}

// ── Execution ─────────────────────────────────────────────────────────────────

/// Runs every phase in order. The first failure ends the run.
pub fn run<R: Runner>(gateway: &mut Gateway<R>, phases: &[Phase]) -> Result<(), InstallerError> {
    let total = u8::try_from(phases.len()).unwrap_or(u8::MAX);

    for (i, phase) in phases.iter().enumerate() {
        ui::print_step(u8::try_from(i + 1).unwrap_or(u8::MAX), total, phase.title);
        info!(target: "install", "Phase: {}", phase.title);

        for action in &phase.actions {
            perform(gateway, action)?;
        }
    }

    info!(target: "install", "Installation pipeline finished");
    Ok(())
}

fn perform<R: Runner>(gateway: &mut Gateway<R>, action: &Action) -> Result<(), InstallerError> {
    match action {
        Action::Run(spec) => {
            gateway.execute(spec)?;
        }
        Action::Write(file) => {
            gateway.write(file)?;
        }
        Action::AppendOutput { command, file } => {
            let result = gateway.execute(command)?;
            let mut file = file.clone();
            file.contents = result.stdout;
            gateway.write(&file)?;
        }
    }
    Ok(())
}
