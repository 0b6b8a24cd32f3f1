use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::{
    catalog::{Catalog, TimezoneCatalog},
    error::InstallerError,
    layout::DiskMapping,
    validate::{self, Rejection},
};

/// Boot firmware interface of the machine being provisioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum FirmwareMode {
    #[strum(serialize = "UEFI")]
    Uefi,
    #[strum(serialize = "BIOS")]
    Bios,
}

impl FirmwareMode {
    /// UEFI when the firmware interface directory exists.
    pub fn detect(efi_path: &Path) -> Self {
        if efi_path.exists() {
            FirmwareMode::Uefi
        } else {
            FirmwareMode::Bios
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "lowercase")]
pub enum DesktopEnvironment {
    Plasma,
    #[strum(serialize = "GNOME")]
    Gnome,
}

impl DesktopEnvironment {
    pub fn packages(self) -> &'static [&'static str] {
        match self {
            DesktopEnvironment::Plasma => &["plasma", "kde-applications"],
            DesktopEnvironment::Gnome => &["gnome", "gnome-extra"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    Firefox,
    Chromium,
}

impl Browser {
    pub fn packages(self) -> &'static [&'static str] {
        match self {
            Browser::Firefox => &["firefox"],
            Browser::Chromium => &["chromium"],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub name: String,
    /// Empty means the account has no password.
    pub password: String,
}

/// Everything the operator chose, filled in one field at a time.
///
/// Collection may leave fields unset; [`InstallConfig::ready`] is the gate the
/// installation pipeline goes through before it touches anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallConfig {
    pub firmware: FirmwareMode,
    pub hostname: Option<String>,
    pub user: Option<UserAccount>,
    pub root_password: Option<String>,
    pub desktop: Option<DesktopEnvironment>,
    #[serde(default)]
    pub browsers: Vec<Browser>,
    pub timezone: Option<String>,
    pub locale: Option<String>,
    pub keymap: Option<String>,
    pub disks: Option<DiskMapping>,
}

/// A fully populated, rule-checked view of an [`InstallConfig`].
#[derive(Debug, Clone, Copy)]
pub struct ReadyConfig<'a> {
    pub firmware: FirmwareMode,
    pub hostname: &'a str,
    pub user: &'a UserAccount,
    pub root_password: &'a str,
    pub timezone: &'a str,
    pub locale: &'a str,
    pub keymap: &'a str,
    pub desktop: Option<DesktopEnvironment>,
    pub browsers: &'a [Browser],
}

impl InstallConfig {
    pub fn new(firmware: FirmwareMode) -> Self {
        Self {
            firmware,
            hostname: None,
            user: None,
            root_password: None,
            desktop: None,
            browsers: Vec::new(),
            timezone: None,
            locale: None,
            keymap: None,
            disks: None,
        }
    }

    pub fn desktop_packages(&self) -> &'static [&'static str] {
        self.desktop.map(DesktopEnvironment::packages).unwrap_or(&[])
    }

    pub fn browser_packages(&self) -> Vec<&'static str> {
        self.browsers
            .iter()
            .flat_map(|b| b.packages().iter().copied())
            .collect()
    }

    /// Checks that every field the pipeline needs is present and passes its rules.
    pub fn ready(&self) -> Result<ReadyConfig<'_>, InstallerError> {
        let hostname = required(&self.hostname, "hostname")?;
        let user = self.user.as_ref().ok_or(InstallerError::Incomplete("user"))?;
        let root_password = required(&self.root_password, "root password")?;
        let timezone = required(&self.timezone, "timezone")?;
        let locale = required(&self.locale, "locale")?;
        let keymap = required(&self.keymap, "keymap")?;

        rule("hostname", validate::hostname(hostname))?;
        rule("username", validate::username(&user.name))?;
        rule("user password", validate::user_password(&user.password))?;
        rule("root password", validate::root_password(root_password))?;
        rule("timezone", validate::timezone_syntax(timezone))?;

        Ok(ReadyConfig {
            firmware: self.firmware,
            hostname,
            user,
            root_password,
            timezone,
            locale,
            keymap,
            desktop: self.desktop,
            browsers: &self.browsers,
        })
    }

    /// Re-checks catalog-backed fields, for a document read back from disk.
    pub fn check_catalogs(
        &self,
        timezones: &TimezoneCatalog,
        locales: &Catalog,
        keymaps: &Catalog,
    ) -> Result<(), InstallerError> {
        let ready = self.ready()?;
        rule("timezone", timezones.check(ready.timezone))?;
        rule("locale", locales.check(ready.locale, "Unknown locale."))?;
        rule("keymap", keymaps.check(ready.keymap, "Unknown keymap."))?;
        Ok(())
    }

    // ── Persistence ───────────────────────────────────────────────────────────

    pub fn to_json(&self) -> Result<String, InstallerError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, InstallerError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads the document left behind by the live-environment stage.
    pub fn load(path: &Path) -> Result<Self, InstallerError> {
        if !path.is_file() {
            return Err(InstallerError::MissingResumeConfig(
                path.display().to_string(),
            ));
        }
        Self::from_json(&fs::read_to_string(path)?)
    }
}

fn required<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str, InstallerError> {
    value.as_deref().ok_or(InstallerError::Incomplete(field))
}

fn rule(field: &'static str, result: Result<(), Rejection>) -> Result<(), InstallerError> {
    result.map_err(|r| InstallerError::invalid(field, r.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{DiskMappingBuilder, Role};

    pub(crate) fn sample() -> InstallConfig {
        InstallConfig {
            firmware: FirmwareMode::Uefi,
            hostname: Some("archbox".into()),
            user: Some(UserAccount {
                name: "alice".into(),
                password: String::new(),
            }),
            root_password: Some("supersecret1".into()),
            desktop: None,
            browsers: Vec::new(),
            timezone: Some("Europe/London".into()),
            locale: Some("en_US".into()),
            keymap: Some("us".into()),
            disks: None,
        }
    }

    #[test]
    fn ready_requires_every_pipeline_field() {
        let mut config = sample();
        assert!(config.ready().is_ok());

        config.keymap = None;
        assert!(matches!(
            config.ready(),
            Err(InstallerError::Incomplete("keymap"))
        ));
    }

    #[test]
    fn ready_rechecks_rules() {
        let mut config = sample();
        config.hostname = Some("-bad.com".into());
        assert!(matches!(
            config.ready(),
            Err(InstallerError::InvalidConfig { field: "hostname", .. })
        ));
    }

    #[test]
    fn package_sets_follow_choices() {
        let mut config = sample();
        assert!(config.desktop_packages().is_empty());
        assert!(config.browser_packages().is_empty());

        config.desktop = Some(DesktopEnvironment::Gnome);
        config.browsers = vec![Browser::Firefox, Browser::Chromium];
        assert_eq!(config.desktop_packages(), ["gnome", "gnome-extra"]);
        assert_eq!(config.browser_packages(), ["firefox", "chromium"]);
    }

    #[test]
    fn document_round_trips_with_disks() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("sda2");
        let esp = dir.path().join("sda1");
        fs::write(&root, "").unwrap();
        fs::write(&esp, "").unwrap();

        let mut builder = DiskMappingBuilder::default();
        builder.assign(Role::Root, root.to_str().unwrap()).unwrap();
        builder.assign(Role::Esp, esp.to_str().unwrap()).unwrap();

        let mut config = sample();
        config.desktop = Some(DesktopEnvironment::Plasma);
        config.browsers = vec![Browser::Firefox];
        config.disks = Some(builder.build().unwrap());

        let path = dir.path().join("install_config.json");
        fs::write(&path, config.to_json().unwrap()).unwrap();
        assert_eq!(InstallConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn missing_document_is_a_precondition_failure() {
        let err = InstallConfig::load(Path::new("/nonexistent/install_config.json")).unwrap_err();
        assert!(matches!(err, InstallerError::MissingResumeConfig(_)));
    }

    #[test]
    fn firmware_detection_follows_path() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(FirmwareMode::detect(dir.path()), FirmwareMode::Uefi);
        assert_eq!(
            FirmwareMode::detect(&dir.path().join("efi")),
            FirmwareMode::Bios
        );
    }

    #[test]
    fn uefi_is_detected_without_efivars() {
        let dir = tempfile::tempdir().unwrap();
        let efi = dir.path().join("sys/firmware/efi");
        std::fs::create_dir_all(&efi).unwrap();
        assert_eq!(FirmwareMode::detect(&efi), FirmwareMode::Uefi);
        assert!(!efi.join("efivars").exists());
    }
}
