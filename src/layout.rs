//! Which block device goes where in the installed system.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};
use thiserror::Error;

/// Input that ends custom mount entry.
pub const CUSTOM_TERMINATOR: &str = "exit";

/// Logical purpose of a partition, independent of its device path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[strum(serialize = "Main Partition")]
    Root,
    #[strum(serialize = "EFI")]
    Esp,
}

impl Role {
    pub fn mountpoint(self) -> &'static str {
        match self {
            Role::Root => "/",
            Role::Esp => "/boot/efi",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("Device path '{0}' must be an absolute path (e.g. /dev/sda1).")]
    RelativeDevice(String),

    #[error("Device {0} does not exist.")]
    MissingDevice(String),

    #[error("Mount point '{0}' must start with '/'.")]
    RelativeMountpoint(String),

    #[error("Mount point '{0}' must not contain '.' or '..' components.")]
    NonCanonicalMountpoint(String),

    #[error("Mount point {0} is already used.")]
    DuplicateMountpoint(String),

    #[error("Invalid format '{0}'. Please use /dev/sdXY:/mountpoint.")]
    Malformed(String),

    #[error("No device assigned to the {0}.")]
    MissingRole(Role),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub role: Role,
    pub device: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomMount {
    pub device: String,
    pub mountpoint: String,
}

/// Required roles plus any extra `device:mountpoint` entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskMapping {
    roles: Vec<RoleAssignment>,
    custom: Vec<CustomMount>,
}

impl DiskMapping {
    pub fn roles(&self) -> &[RoleAssignment] {
        &self.roles
    }

    pub fn custom(&self) -> &[CustomMount] {
        &self.custom
    }

    pub fn device_for(&self, role: Role) -> Option<&str> {
        self.roles
            .iter()
            .find(|a| a.role == role)
            .map(|a| a.device.as_str())
    }

    /// `(device, mountpoint)` pairs: roles first, then custom entries, each in
    /// the order they were entered.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.roles
            .iter()
            .map(|a| (a.device.as_str(), a.role.mountpoint()))
            .chain(
                self.custom
                    .iter()
                    .map(|c| (c.device.as_str(), c.mountpoint.as_str())),
            )
    }

    /// Checks every invariant against the current state of the filesystem.
    ///
    /// Safe to call repeatedly: a device created since the last call is accepted.
    pub fn validate(&self) -> Result<(), LayoutError> {
        for role in Role::iter() {
            if self.device_for(role).is_none() {
                return Err(LayoutError::MissingRole(role));
            }
        }

        let mut seen: Vec<&str> = Vec::new();
        for (device, mountpoint) in self.entries() {
            check_device(device)?;
            check_mountpoint(mountpoint)?;
            if seen.contains(&mountpoint) {
                return Err(LayoutError::DuplicateMountpoint(mountpoint.to_string()));
            }
            seen.push(mountpoint);
        }
        Ok(())
    }
}

/// Accumulates a [`DiskMapping`] while the operator answers prompts.
#[derive(Debug, Default)]
pub struct DiskMappingBuilder {
    roles: Vec<RoleAssignment>,
    custom: Vec<CustomMount>,
}

impl DiskMappingBuilder {
    /// Assigns `device` to `role`, replacing any earlier assignment.
    pub fn assign(&mut self, role: Role, device: &str) -> Result<(), LayoutError> {
        let device = device.trim();
        check_device(device)?;

        match self.roles.iter_mut().find(|a| a.role == role) {
            Some(existing) => existing.device = device.to_string(),
            None => self.roles.push(RoleAssignment {
                role,
                device: device.to_string(),
            }),
        }
        Ok(())
    }

    pub fn add_custom(&mut self, device: &str, mountpoint: &str) -> Result<(), LayoutError> {
        let device = device.trim();
        let mountpoint = normalize_mountpoint(mountpoint.trim());
        check_device(device)?;
        check_mountpoint(&mountpoint)?;

        let taken = Role::iter().any(|r| r.mountpoint() == mountpoint)
            || self.custom.iter().any(|c| c.mountpoint == mountpoint);
        if taken {
            return Err(LayoutError::DuplicateMountpoint(mountpoint));
        }

        self.custom.push(CustomMount {
            device: device.to_string(),
            mountpoint,
        });
        Ok(())
    }

    /// Parses and adds a `device:mountpoint` entry. The last colon splits, since
    /// stable device names (`/dev/disk/by-path/pci-0000:00:17.0-...`) contain colons.
    pub fn add_custom_pair(&mut self, pair: &str) -> Result<(), LayoutError> {
        let (device, mountpoint) = pair
            .rsplit_once(':')
            .ok_or_else(|| LayoutError::Malformed(pair.to_string()))?;
        self.add_custom(device, mountpoint)
    }

    pub fn build(self) -> Result<DiskMapping, LayoutError> {
        let mut roles = self.roles;
        roles.sort_by_key(|a| a.role as u8);
        let mapping = DiskMapping {
            roles,
            custom: self.custom,
        };
        mapping.validate()?;
        Ok(mapping)
    }
}

fn check_device(device: &str) -> Result<(), LayoutError> {
    if !device.starts_with('/') {
        return Err(LayoutError::RelativeDevice(device.to_string()));
    }
    if !Path::new(device).exists() {
        return Err(LayoutError::MissingDevice(device.to_string()));
    }
    Ok(())
}

fn check_mountpoint(mountpoint: &str) -> Result<(), LayoutError> {
    if !mountpoint.starts_with('/') {
        return Err(LayoutError::RelativeMountpoint(mountpoint.to_string()));
    }
    let canonical = Path::new(mountpoint)
        .components()
        .all(|c| matches!(c, Component::RootDir | Component::Normal(_)));
    if !canonical || mountpoint.split('/').any(|s| s == ".") {
        return Err(LayoutError::NonCanonicalMountpoint(mountpoint.to_string()));
    }
    Ok(())
}

fn normalize_mountpoint(mountpoint: &str) -> String {
    let trimmed = mountpoint.trim_end_matches('/');
    if trimmed.is_empty() && mountpoint.starts_with('/') {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

// ── Mount plan ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub device: String,
    /// Mount point as seen from the installed system.
    pub mountpoint: String,
    /// Where it lives under the install target.
    pub target: PathBuf,
}

/// Mount order for a [`DiskMapping`], parents before children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPlan {
    entries: Vec<MountEntry>,
}

impl MountPlan {
    /// Orders entries shallowest path first. The sort is stable, so entries at
    /// the same depth keep the order they were entered in.
    pub fn new(mapping: &DiskMapping, target_root: &Path) -> Self {
        let mut entries: Vec<MountEntry> = mapping
            .entries()
            .map(|(device, mountpoint)| MountEntry {
                device: device.to_string(),
                mountpoint: mountpoint.to_string(),
                target: under(target_root, mountpoint),
            })
            .collect();
        entries.sort_by_key(|e| Path::new(&e.mountpoint).components().count());
        Self { entries }
    }

    pub fn entries(&self) -> &[MountEntry] {
        &self.entries
    }
}

fn under(root: &Path, mountpoint: &str) -> PathBuf {
    let relative = mountpoint.trim_start_matches('/');
    if relative.is_empty() {
        root.to_path_buf()
    } else {
        root.join(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    struct Devices {
        dir: tempfile::TempDir,
    }

    impl Devices {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
            }
        }

        fn make(&self, name: &str) -> String {
            let path = self.dir.path().join(name);
            fs::write(&path, "").unwrap();
            path.to_str().unwrap().to_string()
        }

        fn absent(&self, name: &str) -> String {
            self.dir.path().join(name).to_str().unwrap().to_string()
        }
    }

    fn base(devices: &Devices) -> DiskMappingBuilder {
        let mut builder = DiskMappingBuilder::default();
        builder.assign(Role::Root, &devices.make("sda2")).unwrap();
        builder.assign(Role::Esp, &devices.make("sda1")).unwrap();
        builder
    }

    #[test]
    fn missing_device_is_rejected_until_it_exists() {
        let devices = Devices::new();
        let mut builder = DiskMappingBuilder::default();
        let path = devices.absent("sdb1");

        assert_eq!(
            builder.assign(Role::Root, &path),
            Err(LayoutError::MissingDevice(path.clone()))
        );

        devices.make("sdb1");
        assert!(builder.assign(Role::Root, &path).is_ok());
    }

    #[test]
    fn validate_is_a_fresh_recheck() {
        let devices = Devices::new();
        let mapping = base(&devices).build().unwrap();
        assert!(mapping.validate().is_ok());

        fs::remove_file(mapping.device_for(Role::Esp).unwrap()).unwrap();
        assert!(matches!(
            mapping.validate(),
            Err(LayoutError::MissingDevice(_))
        ));

        devices.make("sda1");
        assert!(mapping.validate().is_ok());
    }

    #[test]
    fn relative_paths_are_rejected() {
        let devices = Devices::new();
        let mut builder = base(&devices);
        let dev = devices.make("sdb1");

        assert!(matches!(
            builder.assign(Role::Root, "dev/sda2"),
            Err(LayoutError::RelativeDevice(_))
        ));
        assert!(matches!(
            builder.add_custom(&dev, "home"),
            Err(LayoutError::RelativeMountpoint(_))
        ));
        assert!(matches!(
            builder.add_custom(&dev, "/home/../etc"),
            Err(LayoutError::NonCanonicalMountpoint(_))
        ));
    }

    #[test]
    fn mountpoints_are_unique() {
        let devices = Devices::new();
        let mut builder = base(&devices);
        let b1 = devices.make("sdb1");
        let b2 = devices.make("sdb2");

        builder.add_custom(&b1, "/home").unwrap();
        assert_eq!(
            builder.add_custom(&b2, "/home/"),
            Err(LayoutError::DuplicateMountpoint("/home".into()))
        );
        assert!(matches!(
            builder.add_custom(&b2, "/boot/efi"),
            Err(LayoutError::DuplicateMountpoint(_))
        ));
        assert!(matches!(
            builder.add_custom(&b2, "/"),
            Err(LayoutError::DuplicateMountpoint(_))
        ));
    }

    #[test]
    fn custom_pairs_are_parsed() {
        let devices = Devices::new();
        let mut builder = base(&devices);
        let dev = devices.make("sdb1");

        assert!(matches!(
            builder.add_custom_pair("/dev/sdb1 /home"),
            Err(LayoutError::Malformed(_))
        ));
        builder.add_custom_pair(&format!("{} : /home", dev)).unwrap();

        let mapping = builder.build().unwrap();
        assert_eq!(mapping.custom()[0].mountpoint, "/home");
        assert_eq!(mapping.custom()[0].device, dev);
    }

    #[test]
    fn device_names_with_colons_are_parsed() {
        let devices = Devices::new();
        let mut builder = base(&devices);
        let dev = devices.make("pci-0000:00:17.0-ata-1-part3");

        builder.add_custom_pair(&format!("{}:/home", dev)).unwrap();

        let mapping = builder.build().unwrap();
        assert_eq!(mapping.custom()[0].device, dev);
        assert_eq!(mapping.custom()[0].mountpoint, "/home");
    }

    #[test]
    fn build_requires_every_role() {
        let devices = Devices::new();
        let mut builder = DiskMappingBuilder::default();
        builder.assign(Role::Root, &devices.make("sda2")).unwrap();
        assert_eq!(builder.build(), Err(LayoutError::MissingRole(Role::Esp)));
    }

    #[test]
    fn roles_are_stored_in_role_order() {
        let devices = Devices::new();
        let mut builder = DiskMappingBuilder::default();
        builder.assign(Role::Esp, &devices.make("sda1")).unwrap();
        builder.assign(Role::Root, &devices.make("sda2")).unwrap();
        let mapping = builder.build().unwrap();
        assert_eq!(mapping.roles()[0].role, Role::Root);
    }

    #[test]
    fn plan_mounts_root_before_custom_entries() {
        let devices = Devices::new();
        let mut builder = base(&devices);
        builder.add_custom(&devices.make("sdb1"), "/home").unwrap();
        builder.add_custom(&devices.make("sdb2"), "/var").unwrap();
        let mapping = builder.build().unwrap();

        let plan = MountPlan::new(&mapping, Path::new("/target"));
        let order: Vec<&str> = plan.entries().iter().map(|e| e.mountpoint.as_str()).collect();
        assert_eq!(order, ["/", "/home", "/var", "/boot/efi"]);
        assert_eq!(plan.entries()[0].target, PathBuf::from("/target"));
        assert_eq!(plan.entries()[3].target, PathBuf::from("/target/boot/efi"));
    }

    #[test]
    fn plan_mounts_parent_before_child_regardless_of_input_order() {
        let devices = Devices::new();
        let mut builder = base(&devices);
        builder.add_custom(&devices.make("sdb1"), "/var/lib").unwrap();
        builder.add_custom(&devices.make("sdb2"), "/var").unwrap();
        let mapping = builder.build().unwrap();

        let plan = MountPlan::new(&mapping, Path::new("/target"));
        let order: Vec<&str> = plan.entries().iter().map(|e| e.mountpoint.as_str()).collect();
        let var = order.iter().position(|m| *m == "/var").unwrap();
        let var_lib = order.iter().position(|m| *m == "/var/lib").unwrap();
        assert!(var < var_lib);
        assert_eq!(order[0], "/");
    }
}
