use std::path::PathBuf;

use clap::Parser;

/// Arch Linux provisioning wizard
#[derive(Parser, Debug)]
#[command(name = "arch-provision")]
#[command(about = "Interactive installer that provisions a bare machine with Arch Linux")]
#[command(version)]
pub struct Cli {
    /// Offer a dry-run (describe commands without running them) and mirror
    /// logs to stderr.
    #[arg(long)]
    pub debug: bool,

    /// Append-only log file.
    #[arg(long, value_name = "PATH", default_value = "provision.log")]
    pub log_file: PathBuf,

    /// Root the new system is mounted under.
    #[arg(long, value_name = "DIR", default_value = "/target")]
    pub target: PathBuf,

    /// Present only inside the live installation medium.
    #[arg(long, value_name = "PATH", default_value = "/tmp/inside-archiso")]
    pub marker: PathBuf,

    /// Saved installation settings, as seen from inside the new system.
    #[arg(long, value_name = "PATH", default_value = "/root/install_config.json")]
    pub resume_config: PathBuf,

    #[arg(long, hide = true, default_value = "/usr/share/zoneinfo")]
    pub zoneinfo: PathBuf,

    #[arg(long, hide = true, default_value = "/usr/share/i18n/locales")]
    pub locale_dir: PathBuf,

    #[arg(long, hide = true, default_value = "/sys/firmware/efi")]
    pub efi_path: PathBuf,
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}

/// Run-wide settings handed to every stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub debug: bool,
    pub log_file: PathBuf,
    pub target: PathBuf,
    pub marker: PathBuf,
    pub resume_config: PathBuf,
    pub zoneinfo: PathBuf,
    pub locale_dir: PathBuf,
    pub efi_path: PathBuf,
}

impl From<Cli> for Settings {
    fn from(cli: Cli) -> Self {
        Self {
            debug: cli.debug,
            log_file: cli.log_file,
            target: cli.target,
            marker: cli.marker,
            resume_config: cli.resume_config,
            zoneinfo: cli.zoneinfo,
            locale_dir: cli.locale_dir,
            efi_path: cli.efi_path,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Cli::parse_from(["arch-provision"]).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_live_medium() {
        let settings = Settings::default();
        assert!(!settings.debug);
        assert_eq!(settings.target, PathBuf::from("/target"));
        assert_eq!(settings.marker, PathBuf::from("/tmp/inside-archiso"));
        assert_eq!(settings.resume_config, PathBuf::from("/root/install_config.json"));
        assert_eq!(settings.log_file, PathBuf::from("provision.log"));
        assert_eq!(settings.efi_path, PathBuf::from("/sys/firmware/efi"));
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "arch-provision",
            "--debug",
            "--target",
            "/mnt",
            "--log-file",
            "/var/log/provision.log",
        ])
        .unwrap();
        let settings = Settings::from(cli);
        assert!(settings.debug);
        assert_eq!(settings.target, PathBuf::from("/mnt"));
        assert_eq!(settings.log_file, PathBuf::from("/var/log/provision.log"));
    }

    #[test]
    fn unknown_flags_are_rejected() {
        assert!(Cli::try_parse_from(["arch-provision", "--dry-run"]).is_err());
    }
}
