use std::path::Path;

use crate::{
    cmd::{CommandSpec, Gateway, Runner},
    error::InstallerError,
    layout::MountPlan,
};

/// Mounts every planned partition into the installation tree.
///
/// The target root is created first. Each mount point directory is created
/// only if it is missing, so a rerun on a half-prepared tree is harmless.
pub fn run<R: Runner>(
    gateway: &mut Gateway<R>,
    plan: &MountPlan,
    target_root: &Path,
) -> Result<(), InstallerError> {
    let root = target_root.display().to_string();
    gateway.execute(&CommandSpec::host(
        format!("Create {}", root),
        ["mkdir", "-p", root.as_str()],
    ))?;

    for entry in plan.entries() {
        let target = entry.target.display().to_string();

        if entry.target != target_root && !entry.target.exists() {
            gateway.execute(&CommandSpec::host(
                format!("Create mountpoint {}", target),
                ["mkdir", "-p", target.as_str()],
            ))?;
        }

        gateway.execute(&CommandSpec::host(
            format!("Mount {} to {}", entry.device, target),
            ["mount", entry.device.as_str(), target.as_str()],
        ))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::{
        cmd::{ExecMode, Rooting},
        layout::{DiskMappingBuilder, Role},
        testing::RecordingRunner,
    };

    #[test]
    fn mounts_in_plan_order_and_skips_existing_dirs() {
        let devices = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();
        let dev = |name: &str| -> String {
            let p = devices.path().join(name);
            fs::write(&p, "").unwrap();
            p.to_str().unwrap().to_string()
        };

        let mut builder = DiskMappingBuilder::default();
        builder.assign(Role::Root, &dev("sda2")).unwrap();
        builder.assign(Role::Esp, &dev("sda1")).unwrap();
        builder.add_custom(&dev("sdb1"), "/home").unwrap();
        let mapping = builder.build().unwrap();

        fs::create_dir(target.path().join("home")).unwrap();

        let plan = MountPlan::new(&mapping, target.path());
        let mut gw = Gateway::new(
            ExecMode::Execute,
            Rooting::Outside {
                target: target.path().to_path_buf(),
            },
            RecordingRunner::default(),
        );
        run(&mut gw, &plan, target.path()).unwrap();

        let programs: Vec<String> = gw
            .runner()
            .commands
            .iter()
            .map(|argv| format!("{} {}", argv[0], argv.last().unwrap()))
            .collect();
        let t = target.path().display();
        assert_eq!(
            programs,
            [
                format!("mkdir {}", t),
                format!("mount {}", t),
                format!("mount {}/home", t),
                format!("mkdir {}/boot/efi", t),
                format!("mount {}/boot/efi", t),
            ]
        );
    }
}
