use serde::Deserialize;
use thiserror::Error;

use crate::{cmd, error::InstallerError};

// ── Data types ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BlockDevice {
    #[serde(default)]
    pub path: String, // /dev/sda
    #[serde(default)]
    pub size: String, // 500GB
    #[serde(default)]
    pub model: String, // ATA Samsung SSD 870
    #[serde(default, rename = "transport", alias = "type")]
    pub kind: String, // scsi, nvme, usb
}

impl BlockDevice {
    /// One-line label shown in the device list.
    pub fn display(&self) -> String {
        let model = if self.model.is_empty() { "—" } else { &self.model };
        format!(
            "{:<14}  {:>8}  {:<6}  {}",
            self.path, self.size, self.kind, model
        )
    }
}

#[derive(Deserialize)]
struct PartedEntry {
    disk: BlockDevice,
}

/// Why an enumeration attempt produced nothing usable. All of these are
/// worth retrying.
#[derive(Debug, Error)]
pub enum EnumerationError {
    #[error("Failed to execute parted: {0}")]
    Tool(#[from] InstallerError),

    #[error("Failed to parse parted output as JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("No disks found! Please check your hardware.")]
    Empty,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Lists the disks `parted` can see.
pub fn list_disks() -> Result<Vec<BlockDevice>, EnumerationError> {
    let output = cmd::run_capture("parted", &["--list", "--json"])?;
    parse_parted(&output)
}

// ── parted --json parser ──────────────────────────────────────────────────────
//
// `parted -lj` prints one JSON document per disk, back to back:
//   { "disk": { "path": "/dev/sda", "size": "500GB", "model": "...", ... } }
//   { "disk": { "path": "/dev/nvme0n1", ... } }

pub fn parse_parted(output: &str) -> Result<Vec<BlockDevice>, EnumerationError> {
    let mut disks = Vec::new();
    for entry in serde_json::Deserializer::from_str(output).into_iter::<PartedEntry>() {
        let disk = entry?.disk;
        if !disk.path.is_empty() {
            disks.push(disk);
        }
    }

    if disks.is_empty() {
        return Err(EnumerationError::Empty);
    }
    Ok(disks)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_DISKS: &str = r#"
{
   "disk": {
      "path": "/dev/sda",
      "size": "500GB",
      "model": "ATA Samsung SSD 870",
      "transport": "scsi",
      "logical-sector-size": 512,
      "physical-sector-size": 512,
      "label": "gpt",
      "partitions": [
         { "number": 1, "start": "1049kB", "end": "538MB", "size": "537MB", "type": "primary" }
      ]
   }
}
{
   "disk": {
      "path": "/dev/nvme0n1",
      "size": "1000GB",
      "model": "",
      "transport": "nvme"
   }
}
"#;

    #[test]
    fn parses_concatenated_documents() {
        let disks = parse_parted(TWO_DISKS).unwrap();
        assert_eq!(disks.len(), 2);
        assert_eq!(disks[0].path, "/dev/sda");
        assert_eq!(disks[0].size, "500GB");
        assert_eq!(disks[0].kind, "scsi");
        assert_eq!(disks[1].path, "/dev/nvme0n1");
        assert!(disks[1].display().contains('—'));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(
            parse_parted("Error: no device found"),
            Err(EnumerationError::Parse(_))
        ));
    }

    #[test]
    fn no_disks_is_retryable() {
        assert!(matches!(parse_parted(""), Err(EnumerationError::Empty)));
    }
}
